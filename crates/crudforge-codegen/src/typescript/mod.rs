//! TypeScript / NestJS code generation passes.
//!
//! Each entity gets a feature directory named after its route
//! (`src/blog-posts/`) holding the TypeORM entity, DTOs, repository, service,
//! controller and module, the layout `nest g resource` produces. npm packages
//! are recorded as `npm:dep:<name>` / `npm:dev:<name>` metadata and
//! `package.json` is re-rendered from them.

pub mod base;
pub mod passes;

pub use base::TypeScriptBasePass;

use crudforge_schema::SqlType;

use crate::model::Entity;
use crate::options::{Database, GeneratorOptions};
use crate::pass::{GenerationContext, PassManager};
use crate::types::{TypeMapper, TypeScriptTypes};

/// Creates a PassManager with the NestJS stack.
pub fn nestjs_stack(options: &GeneratorOptions) -> PassManager {
    let mut pm = PassManager::with_options(options.clone());
    pm.add(TypeScriptBasePass);
    pm.add(passes::TypeScriptDataPass);
    pm.add(passes::NestWebPass);
    if options.auth {
        pm.add(passes::TypeScriptAuthPass);
    }
    if options.storage {
        pm.add(passes::TypeScriptStoragePass);
    }
    if options.tests {
        pm.add(passes::TypeScriptTestsPass);
    }
    pm
}

const NEST_VERSION: &str = "^10.4.1";

/// `src/<route>/<rel>`
pub(crate) fn feature_path(entity: &Entity<'_>, rel: &str) -> String {
    format!("src/{}/{rel}", entity.names.route)
}

/// The TypeScript type of the entity's key.
pub(crate) fn id_type(entity: &Entity<'_>) -> String {
    TypeScriptTypes.map(&entity.id.column.sql_type)
}

/// The pipe converting an `:id` path parameter, if the key is not a string.
pub(crate) fn id_pipe(entity: &Entity<'_>) -> Option<&'static str> {
    match &entity.id.column.sql_type {
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => Some("ParseIntPipe"),
        SqlType::Uuid => Some("ParseUUIDPipe"),
        _ => None,
    }
}

/// A key literal for specs.
pub(crate) fn sample_id(entity: &Entity<'_>) -> String {
    match &entity.id.column.sql_type {
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "1".to_string(),
        SqlType::Uuid => "'7c9e6679-7425-40de-944b-e07fc1f90ae7'".to_string(),
        _ => "'1'".to_string(),
    }
}

/// `import { A, B } from 'module';` with the names sorted.
pub(crate) fn import_line<S: AsRef<str>>(names: &[S], from: &str) -> String {
    let mut names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    names.dedup();
    format!("import {{ {} }} from '{from}';\n", names.join(", "))
}

/// The API prefix in the form `setGlobalPrefix` takes, without slashes.
pub(crate) fn global_prefix(options: &GeneratorOptions) -> Option<String> {
    let prefix = options.api_prefix.trim_matches('/');
    if prefix.is_empty() {
        None
    } else {
        Some(prefix.to_string())
    }
}

/// Records a runtime dependency.
pub(crate) fn add_dependency(ctx: &mut GenerationContext, name: &str, version: &str) {
    ctx.set_metadata(format!("npm:dep:{name}"), version);
}

/// Records a development dependency.
pub(crate) fn add_dev_dependency(ctx: &mut GenerationContext, name: &str, version: &str) {
    ctx.set_metadata(format!("npm:dev:{name}"), version);
}

/// NestJS, TypeORM, validation and the driver for the configured database.
pub(crate) fn add_nest_packages(ctx: &mut GenerationContext) {
    for name in ["@nestjs/common", "@nestjs/core", "@nestjs/platform-express"] {
        add_dependency(ctx, name, NEST_VERSION);
    }
    add_dependency(ctx, "@nestjs/config", "^3.2.3");
    add_dependency(ctx, "@nestjs/mapped-types", "^2.0.5");
    add_dependency(ctx, "@nestjs/typeorm", "^10.0.2");
    add_dependency(ctx, "class-transformer", "^0.5.1");
    add_dependency(ctx, "class-validator", "^0.14.1");
    add_dependency(ctx, "reflect-metadata", "^0.2.2");
    add_dependency(ctx, "rxjs", "^7.8.1");
    add_dependency(ctx, "typeorm", "^0.3.20");
    let (driver, version) = driver(ctx.options.database);
    add_dependency(ctx, driver, version);

    add_dev_dependency(ctx, "@nestjs/cli", "^10.4.5");
    add_dev_dependency(ctx, "@types/express", "^4.17.21");
    add_dev_dependency(ctx, "@types/node", "^20.14.0");
    add_dev_dependency(ctx, "typescript", "^5.5.4");
}

fn driver(database: Database) -> (&'static str, &'static str) {
    match database {
        Database::Postgres => ("pg", "^8.12.0"),
        Database::Mysql => ("mysql2", "^3.11.0"),
        Database::Sqlite => ("sqlite3", "^5.1.7"),
    }
}

fn json_entries(entries: &[(String, String)], indent: &str) -> String {
    entries
        .iter()
        .map(|(k, v)| format!("{indent}\"{k}\": \"{v}\""))
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Renders `package.json` from the `npm:` metadata. The Jest block is
/// included once the tests pass has added Jest.
pub(crate) fn render_package_json(ctx: &mut GenerationContext) {
    let collect = |prefix: &str| -> Vec<(String, String)> {
        ctx.metadata_with_prefix(prefix)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    };
    let deps = collect("npm:dep:");
    let dev = collect("npm:dev:");
    let has_jest = dev.iter().any(|(name, _)| name == "jest");

    let mut scripts = vec![
        ("build".to_string(), "nest build".to_string()),
        ("start".to_string(), "nest start".to_string()),
        ("start:dev".to_string(), "nest start --watch".to_string()),
        ("start:prod".to_string(), "node dist/main".to_string()),
    ];
    if has_jest {
        scripts.push(("test".to_string(), "jest".to_string()));
    }
    let jest = if has_jest {
        r#",
  "jest": {
    "moduleFileExtensions": ["js", "json", "ts"],
    "rootDir": "src",
    "testRegex": ".*\\.spec\\.ts$",
    "transform": {
      "^.+\\.(t|j)s$": "ts-jest"
    },
    "testEnvironment": "node"
  }"#
    } else {
        ""
    };

    let package = format!(
        "{{\n  \"name\": \"{name}\",\n  \"version\": \"{version}\",\n  \"private\": true,\n  \"scripts\": {{\n{scripts}\n  }},\n  \"dependencies\": {{\n{deps}\n  }},\n  \"devDependencies\": {{\n{dev}\n  }}{jest}\n}}\n",
        name = ctx.options.project_name,
        version = ctx.options.version,
        scripts = json_entries(&scripts, "    "),
        deps = json_entries(&deps, "    "),
        dev = json_entries(&dev, "    "),
    );
    ctx.set_file("package.json", package);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_line_sorts() {
        assert_eq!(
            import_line(&["Post", "Get", "Body", "Get"], "@nestjs/common"),
            "import { Body, Get, Post } from '@nestjs/common';\n"
        );
    }

    #[test]
    fn test_global_prefix() {
        let mut options = GeneratorOptions::default();
        assert_eq!(global_prefix(&options).as_deref(), Some("api"));
        options.api_prefix = "/api/v1".to_string();
        assert_eq!(global_prefix(&options).as_deref(), Some("api/v1"));
        options.api_prefix = String::new();
        assert_eq!(global_prefix(&options), None);
    }

    #[test]
    fn test_package_json() {
        let mut ctx = GenerationContext::new();
        add_nest_packages(&mut ctx);
        render_package_json(&mut ctx);
        let package = ctx.get_file("package.json").unwrap();
        assert!(package.contains("  \"name\": \"app\",\n"));
        assert!(package.contains("    \"@nestjs/core\": \"^10.4.1\""));
        assert!(package.contains("    \"pg\": \"^8.12.0\""));
        assert!(!package.contains("\"jest\""));

        add_dev_dependency(&mut ctx, "jest", "^29.7.0");
        render_package_json(&mut ctx);
        let package = ctx.get_file("package.json").unwrap();
        assert!(package.contains("    \"test\": \"jest\""));
        assert!(package.contains("\"rootDir\": \"src\""));
    }
}
