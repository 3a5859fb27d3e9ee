//! Go code generation passes.
//!
//! A shared base/data layer (GORM models, request/response DTOs,
//! repositories and services under `internal/`) is wired into HTTP by one of
//! two web passes, Gin or Chi. Module requirements are recorded as
//! `go:require:<module>` metadata and `go.mod` is re-rendered from them.

pub mod base;
pub mod passes;

pub use base::GoBasePass;

use crudforge_schema::SqlType;

use crate::model::{Entity, Field};
use crate::options::{Database, GeneratorOptions};
use crate::pass::{GenerationContext, Pass, PassManager};
use crate::types::{GoTypes, TypeMapper};

const GO_VERSION: &str = "1.22";

/// Creates a PassManager with the Gin stack.
pub fn gin_stack(options: &GeneratorOptions) -> PassManager {
    stack(options, passes::GinPass)
}

/// Creates a PassManager with the Chi stack.
pub fn chi_stack(options: &GeneratorOptions) -> PassManager {
    stack(options, passes::ChiPass)
}

fn stack<P: Pass + 'static>(options: &GeneratorOptions, web: P) -> PassManager {
    let mut pm = PassManager::with_options(options.clone());
    pm.add(GoBasePass);
    pm.add(passes::GoDataPass);
    pm.add(web);
    if options.auth {
        pm.add(passes::GoAuthPass);
    }
    if options.storage {
        pm.add(passes::GoStoragePass);
    }
    if options.tests {
        pm.add(passes::GoTestsPass);
    }
    pm
}

const INITIALISMS: &[&str] = &["id", "url", "uri", "uuid", "api", "http", "json", "sql", "ip"];

/// Exported Go identifier for a snake_case name: `author_id` becomes
/// `AuthorID`.
pub(crate) fn go_name(snake: &str) -> String {
    snake
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if INITIALISMS.contains(&segment.to_ascii_lowercase().as_str()) {
                segment.to_ascii_uppercase()
            } else {
                let mut chars = segment.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            }
        })
        .collect()
}

/// The Go field name of a column.
pub(crate) fn field_name(field: &Field<'_>) -> String {
    go_name(&field.snake)
}

/// The module path, which is also the import root.
pub(crate) fn module_path(options: &GeneratorOptions) -> String {
    options.project_name.clone()
}

/// The Go type of the entity's key.
pub(crate) fn id_type(entity: &Entity<'_>) -> String {
    GoTypes.map(&entity.id.column.sql_type)
}

/// A Go expression for a sample key value.
pub(crate) fn id_literal(entity: &Entity<'_>) -> String {
    match &entity.id.column.sql_type {
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "1".to_string(),
        SqlType::Uuid => "uuid.MustParse(\"7c9e6679-7425-40de-944b-e07fc1f90ae7\")".to_string(),
        _ => "\"1\"".to_string(),
    }
}

/// Records a module requirement for `go.mod`.
pub(crate) fn add_require(ctx: &mut GenerationContext, module: &str, version: &str) {
    ctx.set_metadata(format!("go:require:{module}"), version);
}

/// GORM plus the driver for the configured database.
pub(crate) fn add_gorm(ctx: &mut GenerationContext) {
    add_require(ctx, "gorm.io/gorm", "v1.25.12");
    let (module, version) = driver(ctx.options.database);
    add_require(ctx, module, version);
}

/// The GORM driver module and version for a database.
pub(crate) fn driver(database: Database) -> (&'static str, &'static str) {
    match database {
        Database::Postgres => ("gorm.io/driver/postgres", "v1.5.9"),
        Database::Mysql => ("gorm.io/driver/mysql", "v1.5.7"),
        Database::Sqlite => ("gorm.io/driver/sqlite", "v1.5.6"),
    }
}

/// A connection string in the form the GORM driver accepts.
pub(crate) fn example_dsn(options: &GeneratorOptions) -> String {
    let db = options.snake_name();
    match options.database {
        Database::Postgres => options.database.example_url(&db),
        Database::Mysql => format!("root:root@tcp(localhost:3306)/{db}?parseTime=true"),
        Database::Sqlite => format!("{db}.db"),
    }
}

/// Renders `go.mod` from the `go:require:` metadata.
pub(crate) fn render_go_mod(ctx: &mut GenerationContext) {
    let mut requires = String::new();
    for (module, version) in ctx.metadata_with_prefix("go:require:") {
        requires.push_str(&format!("\t{module} {version}\n"));
    }
    let go_mod = format!(
        "module {}\n\ngo {GO_VERSION}\n\nrequire (\n{requires})\n",
        module_path(&ctx.options)
    );
    ctx.set_file("go.mod", go_mod);
}

/// An `import` block with the standard library group first, as goimports
/// leaves it. Paths under `module` or with a dotted host are not std.
pub(crate) fn imports<S: AsRef<str>>(module: &str, paths: &[S]) -> String {
    let mut std = Vec::new();
    let mut external = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let host = path.split('/').next().unwrap_or(path);
        if host.contains('.') || host == module {
            external.push(path);
        } else {
            std.push(path);
        }
    }
    std.sort_unstable();
    std.dedup();
    external.sort_unstable();
    external.dedup();

    let mut out = String::from("import (\n");
    for path in &std {
        out.push_str(&format!("\t\"{path}\"\n"));
    }
    if !std.is_empty() && !external.is_empty() {
        out.push('\n');
    }
    for path in &external {
        out.push_str(&format!("\t\"{path}\"\n"));
    }
    out.push_str(")\n");
    out
}

/// Lays out rows the way gofmt aligns struct fields and keyed literals:
/// every cell but the last in a row is padded to its column's width.
pub(crate) fn align(rows: &[Vec<String>], indent: &str) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(row.len().saturating_sub(1)) {
            widths[i] = widths[i].max(cell.len());
        }
    }
    let mut out = String::new();
    for row in rows {
        out.push_str(indent);
        for (i, cell) in row.iter().enumerate() {
            if i + 1 == row.len() {
                out.push_str(cell);
            } else {
                out.push_str(&format!("{cell:<width$} ", width = widths[i]));
            }
        }
        out.push('\n');
    }
    out
}

/// Type imports (`time`, `uuid`, `encoding/json`) the entity's columns need.
pub(crate) fn type_imports(entity: &Entity<'_>) -> Vec<String> {
    let mut out: Vec<String> = entity
        .fields
        .iter()
        .filter_map(|f| GoTypes.import_for(&f.column.sql_type))
        .map(str::to_string)
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_name() {
        assert_eq!(go_name("author_id"), "AuthorID");
        assert_eq!(go_name("id"), "ID");
        assert_eq!(go_name("avatar_url"), "AvatarURL");
        assert_eq!(go_name("display_name"), "DisplayName");
    }

    #[test]
    fn test_imports_are_grouped() {
        let block = imports("app", &["gorm.io/gorm", "time", "app/internal/models", "context"]);
        assert_eq!(
            block,
            "import (\n\t\"context\"\n\t\"time\"\n\n\t\"app/internal/models\"\n\t\"gorm.io/gorm\"\n)\n"
        );
    }

    #[test]
    fn test_align() {
        let rows = vec![
            vec!["ID".to_string(), "int64".to_string(), "`json:\"id\"`".to_string()],
            vec!["Title".to_string(), "string".to_string(), "`json:\"title\"`".to_string()],
        ];
        assert_eq!(
            align(&rows, "\t"),
            "\tID    int64  `json:\"id\"`\n\tTitle string `json:\"title\"`\n"
        );
    }

    #[test]
    fn test_render_go_mod() {
        let mut ctx = GenerationContext::new();
        add_gorm(&mut ctx);
        render_go_mod(&mut ctx);
        let go_mod = ctx.get_file("go.mod").unwrap();
        assert!(go_mod.starts_with("module app\n\ngo 1.22\n"));
        assert!(go_mod.contains("\tgorm.io/driver/postgres v1.5.9\n"));
    }
}
