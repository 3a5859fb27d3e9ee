//! C# / ASP.NET Core 8 code generation passes.
//!
//! The web project lives in `src/<Project>/` and the xUnit project in
//! `tests/<Project>.Tests/`. NuGet packages are recorded as `nuget:<id>`
//! metadata and the `.csproj` is re-rendered from them. `AppDbContext` is
//! re-rendered the same way once the auth pass adds the accounts set.

pub mod base;
pub mod passes;

pub use base::CSharpBasePass;

use crudforge_schema::RelationshipKind;

use crate::model::Entity;
use crate::naming::to_pascal_case;
use crate::options::{Database, GeneratorOptions};
use crate::pass::{GenerationContext, PassManager};
use crate::types::{CSharpTypes, TypeMapper};

/// Creates a PassManager with the ASP.NET Core stack.
pub fn aspnet_stack(options: &GeneratorOptions) -> PassManager {
    let mut pm = PassManager::with_options(options.clone());
    pm.add(CSharpBasePass);
    pm.add(passes::CSharpDataPass);
    pm.add(passes::AspNetWebPass);
    if options.auth {
        pm.add(passes::CSharpAuthPass);
    }
    if options.storage {
        pm.add(passes::CSharpStoragePass);
    }
    if options.tests {
        pm.add(passes::CSharpTestsPass);
    }
    pm
}

const EF_CORE_VERSION: &str = "8.0.8";

/// Root namespace: the package with each segment in PascalCase.
pub(crate) fn namespace(options: &GeneratorOptions) -> String {
    options
        .package
        .split('.')
        .map(to_pascal_case)
        .collect::<Vec<_>>()
        .join(".")
}

/// Name of the web project (and its directory).
pub(crate) fn project(options: &GeneratorOptions) -> String {
    options.pascal_name()
}

/// `src/<Project>/<rel>`
pub(crate) fn src_path(options: &GeneratorOptions, rel: &str) -> String {
    format!("src/{}/{rel}", project(options))
}

/// `tests/<Project>.Tests/<rel>`
pub(crate) fn test_path(options: &GeneratorOptions, rel: &str) -> String {
    format!("tests/{}.Tests/{rel}", project(options))
}

/// The C# type of the entity's key.
pub(crate) fn id_type(entity: &Entity<'_>) -> String {
    CSharpTypes.map(&entity.id.column.sql_type)
}

/// Records a NuGet package for the web project.
pub(crate) fn add_package(ctx: &mut GenerationContext, id: &str, version: &str) {
    ctx.set_metadata(format!("nuget:{id}"), version);
}

fn provider_package(database: Database) -> (&'static str, &'static str) {
    match database {
        Database::Postgres => ("Npgsql.EntityFrameworkCore.PostgreSQL", "8.0.4"),
        Database::Mysql => ("Pomelo.EntityFrameworkCore.MySql", "8.0.2"),
        Database::Sqlite => ("Microsoft.EntityFrameworkCore.Sqlite", EF_CORE_VERSION),
    }
}

/// EF Core plus the provider for the configured database.
pub(crate) fn add_ef_packages(ctx: &mut GenerationContext) {
    add_package(ctx, "Microsoft.EntityFrameworkCore", EF_CORE_VERSION);
    let (id, version) = provider_package(ctx.options.database);
    add_package(ctx, id, version);
}

/// The `Use*` call configuring the provider in `Program.cs`.
pub(crate) fn provider_call(database: Database) -> &'static str {
    match database {
        Database::Postgres => "options.UseNpgsql(connectionString)",
        Database::Mysql => "options.UseMySql(connectionString, ServerVersion.AutoDetect(connectionString))",
        Database::Sqlite => "options.UseSqlite(connectionString)",
    }
}

/// Renders the web project's `.csproj` from the `nuget:` metadata.
pub(crate) fn render_csproj(ctx: &mut GenerationContext) {
    let namespace = namespace(&ctx.options);
    let mut packages = String::new();
    for (id, version) in ctx.metadata_with_prefix("nuget:") {
        packages.push_str(&format!(
            "    <PackageReference Include=\"{id}\" Version=\"{version}\" />\n"
        ));
    }
    let csproj = format!(
        r#"<Project Sdk="Microsoft.NET.Sdk.Web">

  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
    <Nullable>enable</Nullable>
    <ImplicitUsings>enable</ImplicitUsings>
    <RootNamespace>{namespace}</RootNamespace>
    <Version>{version}</Version>
  </PropertyGroup>

  <ItemGroup>
{packages}  </ItemGroup>

</Project>
"#,
        version = ctx.options.version,
    );
    let path = src_path(&ctx.options, &format!("{}.csproj", project(&ctx.options)));
    ctx.set_file(path, csproj);
}

/// Renders `Data/AppDbContext.cs`: one `DbSet` per entity, many-to-many
/// join tables, and the accounts set when auth is enabled.
pub(crate) fn render_db_context(entities: &[Entity<'_>], ctx: &mut GenerationContext) {
    let namespace = namespace(&ctx.options);
    let mut sets = String::new();
    for entity in entities {
        sets.push_str(&format!(
            "    public DbSet<{}> {} => Set<{}>();\n",
            entity.names.pascal, entity.names.pascal_plural, entity.names.pascal
        ));
    }
    if ctx.has_metadata("has:auth") {
        sets.push_str("    public DbSet<Account> Accounts => Set<Account>();\n");
    }

    let mut model = String::new();
    for entity in entities {
        for rel in entity
            .relations
            .iter()
            .filter(|r| r.kind == RelationshipKind::ManyToMany && r.owner)
        {
            let (Some(join), Some(inverse)) = (&rel.join_table, &rel.inverse_column) else {
                continue;
            };
            let with_many = match rel.mapped_by_pascal() {
                Some(back) => format!(".WithMany(e => e.{back})"),
                None => ".WithMany()".to_string(),
            };
            model.push_str(&format!(
                r#"        modelBuilder.Entity<{owner}>()
            .HasMany(e => e.{property})
            {with_many}
            .UsingEntity(
                "{join}",
                r => r.HasOne(typeof({target})).WithMany().HasForeignKey("{inverse}"),
                l => l.HasOne(typeof({owner})).WithMany().HasForeignKey("{column}"));
"#,
                owner = entity.names.pascal,
                property = rel.pascal,
                target = rel.target.pascal,
                column = rel.column,
            ));
        }
    }
    let on_model_creating = if model.is_empty() {
        String::new()
    } else {
        format!(
            "\n    protected override void OnModelCreating(ModelBuilder modelBuilder)\n    {{\n{model}    }}\n"
        )
    };

    let code = format!(
        r#"using {namespace}.Models;
using Microsoft.EntityFrameworkCore;

namespace {namespace}.Data;

public class AppDbContext : DbContext
{{
    public AppDbContext(DbContextOptions<AppDbContext> options) : base(options)
    {{
    }}

{sets}{on_model_creating}}}
"#
    );
    let path = src_path(&ctx.options, "Data/AppDbContext.cs");
    ctx.set_file(path, code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{entities, test_support::blog};

    #[test]
    fn test_namespace_and_paths() {
        let options = GeneratorOptions::default();
        assert_eq!(namespace(&options), "Com.Example.App");
        assert_eq!(src_path(&options, "Program.cs"), "src/App/Program.cs");
        assert_eq!(test_path(&options, "X.cs"), "tests/App.Tests/X.cs");
    }

    #[test]
    fn test_db_context_maps_join_tables() {
        let schema = blog();
        let entities = entities(&schema);
        let mut ctx = GenerationContext::new();
        render_db_context(&entities, &mut ctx);
        let code = ctx.get_file("src/App/Data/AppDbContext.cs").unwrap();
        assert!(code.contains("public DbSet<Post> Posts => Set<Post>();"));
        assert!(code.contains(".HasMany(e => e.Tags)\n            .WithMany(e => e.Posts)"));
        assert!(code.contains("\"post_tags\""));
        assert!(code.contains("HasForeignKey(\"tag_id\")"));
        assert!(!code.contains("Account"));
    }

    #[test]
    fn test_render_csproj() {
        let mut ctx = GenerationContext::new();
        add_ef_packages(&mut ctx);
        render_csproj(&mut ctx);
        let csproj = ctx.get_file("src/App/App.csproj").unwrap();
        assert!(csproj.contains("<PackageReference Include=\"Npgsql.EntityFrameworkCore.PostgreSQL\" Version=\"8.0.4\" />"));
        assert!(csproj.contains("<RootNamespace>Com.Example.App</RootNamespace>"));
    }
}
