//! PHP / Laravel 11 code generation passes.
//!
//! Everything lives under the `App\` namespace in the standard Laravel
//! layout. Composer packages are recorded as `composer:require:<name>` and
//! `composer:dev:<name>` metadata and `composer.json` is re-rendered from
//! them by every pass that adds one.

pub mod base;
pub mod passes;

pub use base::PhpBasePass;

use crudforge_schema::SqlType;

use crate::model::{Entity, Field};
use crate::options::{Database, GeneratorOptions};
use crate::pass::{GenerationContext, PassManager};
use crate::types::{sample_json, PhpTypes, TypeMapper};

/// Creates a PassManager with the Laravel stack.
pub fn laravel_stack(options: &GeneratorOptions) -> PassManager {
    let mut pm = PassManager::with_options(options.clone());
    pm.add(PhpBasePass);
    pm.add(passes::PhpDataPass);
    pm.add(passes::LaravelWebPass);
    if options.auth {
        pm.add(passes::PhpAuthPass);
    }
    if options.storage {
        pm.add(passes::PhpStoragePass);
    }
    if options.tests {
        pm.add(passes::PhpTestsPass);
    }
    pm
}

/// The PHP type of the entity's key, `int` or `string`.
pub(crate) fn id_type(entity: &Entity<'_>) -> String {
    PhpTypes.map(&entity.id.column.sql_type)
}

/// A route constraint call for the `{id}` segment, if the key type has one.
pub(crate) fn id_constraint(entity: &Entity<'_>) -> Option<&'static str> {
    match &entity.id.column.sql_type {
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => Some("->whereNumber('id')"),
        SqlType::Uuid => Some("->whereUuid('id')"),
        _ => None,
    }
}

/// A key value that is valid for the route but matches no row.
pub(crate) fn missing_id(entity: &Entity<'_>) -> &'static str {
    match &entity.id.column.sql_type {
        SqlType::Uuid => "7c9e6679-7425-40de-944b-e07fc1f90ae7",
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "999",
        _ => "missing",
    }
}

/// The Laravel connection name for a database.
pub(crate) fn connection(database: Database) -> &'static str {
    match database {
        Database::Postgres => "pgsql",
        Database::Mysql => "mysql",
        Database::Sqlite => "sqlite",
    }
}

/// The API prefix without slashes, as `withRouting(apiPrefix:)` takes it.
pub(crate) fn api_prefix(options: &GeneratorOptions) -> &str {
    options.api_prefix.trim_matches('/')
}

/// A PHP single-quoted string literal.
pub(crate) fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// A PHP literal for a JSON sample value.
fn php_literal(ty: &SqlType) -> String {
    match ty {
        SqlType::Json => "['example' => true]".to_string(),
        _ => {
            let json = sample_json(ty);
            match json.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                Some(text) => quote(&text.replace("\\\"", "\"")),
                None => json,
            }
        }
    }
}

/// A PHP array with every required writable field of `entity`.
///
/// `None` when a required field is a foreign key.
pub(crate) fn sample_array(entity: &Entity<'_>) -> Option<String> {
    entity.sample_payload(|f| f.snake.clone())?;
    let pairs: Vec<String> = entity
        .writable()
        .filter(|f| f.column.is_required())
        .map(|f: &Field<'_>| format!("{} => {}", quote(f.name()), php_literal(&f.column.sql_type)))
        .collect();
    Some(format!("[{}]", pairs.join(", ")))
}

/// Records a runtime Composer package.
pub(crate) fn add_require(ctx: &mut GenerationContext, package: &str, constraint: &str) {
    ctx.set_metadata(format!("composer:require:{package}"), constraint);
}

/// Records a development Composer package.
pub(crate) fn add_dev_require(ctx: &mut GenerationContext, package: &str, constraint: &str) {
    ctx.set_metadata(format!("composer:dev:{package}"), constraint);
}

fn json_entries(entries: &[(String, String)], indent: &str) -> String {
    entries
        .iter()
        .map(|(name, version)| format!("{indent}\"{name}\": \"{version}\""))
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Renders `composer.json` from the `composer:` metadata.
pub(crate) fn render_composer_json(ctx: &mut GenerationContext) {
    let mut require = vec![("php".to_string(), "^8.2".to_string())];
    require.extend(
        ctx.metadata_with_prefix("composer:require:")
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    let dev: Vec<(String, String)> = ctx
        .metadata_with_prefix("composer:dev:")
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let scripts = if dev.iter().any(|(name, _)| name == "phpunit/phpunit") {
        "    \"scripts\": {\n        \"test\": \"phpunit\"\n    },\n"
    } else {
        ""
    };
    let name = ctx.options.project_name.to_ascii_lowercase();
    let composer = format!(
        r#"{{
    "name": "{name}/{name}",
    "type": "project",
    "description": "{pascal} API",
    "version": "{version}",
    "require": {{
{require}
    }},
    "require-dev": {{
{dev}
    }},
    "autoload": {{
        "psr-4": {{
            "App\\": "app/"
        }}
    }},
    "autoload-dev": {{
        "psr-4": {{
            "Tests\\": "tests/"
        }}
    }},
{scripts}    "config": {{
        "optimize-autoloader": true,
        "sort-packages": true
    }},
    "minimum-stability": "stable",
    "prefer-stable": true
}}
"#,
        pascal = ctx.options.pascal_name(),
        version = ctx.options.version,
        require = json_entries(&require, "        "),
        dev = json_entries(&dev, "        "),
    );
    ctx.set_file("composer.json", composer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{entities, test_support::blog};

    #[test]
    fn test_render_composer_json() {
        let mut ctx = GenerationContext::new();
        add_require(&mut ctx, "laravel/framework", "^11.0");
        add_dev_require(&mut ctx, "phpunit/phpunit", "^11.0");
        render_composer_json(&mut ctx);
        let composer = ctx.get_file("composer.json").unwrap();
        assert!(composer.contains("\"name\": \"app/app\""));
        assert!(composer.contains("        \"php\": \"^8.2\",\n        \"laravel/framework\": \"^11.0\"\n"));
        assert!(composer.contains("\"test\": \"phpunit\""));
        assert!(composer.contains("\"App\\\\\": \"app/\""));
    }

    #[test]
    fn test_sample_array() {
        let schema = blog();
        let all = entities(&schema);
        assert_eq!(sample_array(&all[0]).as_deref(), Some("['email' => 'example']"));
        assert_eq!(sample_array(&all[1]), None);
        assert_eq!(id_constraint(&all[2]), Some("->whereNumber('id')"));
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("it's"), r"'it\'s'");
        assert_eq!(api_prefix(&GeneratorOptions::default()), "api");
    }
}
