//! Files shared by the Gin and Chi passes: configuration, the entry point,
//! the handler dependencies and the README.

use crudforge_schema::SqlType;

use crate::go::{add_require, align, example_dsn, id_type, imports, module_path, render_go_mod};
use crate::model::Entity;
use crate::options::GeneratorOptions;
use crate::pass::GenerationContext;

/// The HTTP framework a web pass targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Framework {
    Gin,
    Chi,
}

impl Framework {
    fn module(self) -> (&'static str, &'static str) {
        match self {
            Framework::Gin => ("github.com/gin-gonic/gin", "v1.10.0"),
            Framework::Chi => ("github.com/go-chi/chi/v5", "v5.1.0"),
        }
    }

    pub(super) fn import(self) -> &'static str {
        self.module().0
    }

    fn title(self) -> &'static str {
        match self {
            Framework::Gin => "Gin",
            Framework::Chi => "Chi",
        }
    }
}

/// Feature flags left by the auth and storage passes.
#[derive(Debug, Clone, Copy)]
pub(super) struct Features {
    pub auth: bool,
    pub storage: bool,
}

impl Features {
    pub(super) fn from_context(ctx: &GenerationContext) -> Self {
        Self {
            auth: ctx.has_metadata("has:auth"),
            storage: ctx.has_metadata("has:storage"),
        }
    }
}

/// Writes the framework-neutral files and adds the framework to `go.mod`.
pub(super) fn write_common(
    entities: &[Entity<'_>],
    ctx: &mut GenerationContext,
    framework: Framework,
    features: Features,
) {
    let module = module_path(&ctx.options);
    ctx.set_file("internal/config/config.go", generate_config(&module, features));
    ctx.set_file("internal/handlers/deps.go", generate_deps(&module, entities, features));
    ctx.set_file("cmd/server/main.go", generate_main(&module, entities, features));
    ctx.set_file(".env.example", generate_env(&ctx.options, features));
    let readme = generate_readme(entities, &ctx.options, framework, features);
    ctx.set_file("README.md", readme);

    let (path, version) = framework.module();
    add_require(ctx, path, version);
    render_go_mod(ctx);
}

/// `parse<Entity>ID`, turning a path segment into the key type, and the
/// import it needs.
pub(super) fn parse_id(entity: &Entity<'_>) -> (String, &'static str) {
    let pascal = &entity.names.pascal;
    let id = id_type(entity);
    let (body, import) = match &entity.id.column.sql_type {
        SqlType::SmallInt => (
            "\tv, err := strconv.ParseInt(raw, 10, 16)\n\treturn int16(v), err\n",
            "strconv",
        ),
        SqlType::Integer => (
            "\tv, err := strconv.ParseInt(raw, 10, 32)\n\treturn int32(v), err\n",
            "strconv",
        ),
        SqlType::BigInt => ("\treturn strconv.ParseInt(raw, 10, 64)\n", "strconv"),
        SqlType::Uuid => ("\treturn uuid.Parse(raw)\n", "github.com/google/uuid"),
        _ => ("\tif raw == \"\" {\n\t\treturn \"\", errors.New(\"empty id\")\n\t}\n\treturn raw, nil\n", "errors"),
    };
    (
        format!("func parse{pascal}ID(raw string) ({id}, error) {{\n{body}}}\n"),
        import,
    )
}

/// The `api` group path, or `None` when routes sit at the root.
pub(super) fn api_prefix(options: &GeneratorOptions) -> Option<&str> {
    if options.api_prefix.is_empty() {
        None
    } else {
        Some(options.api_prefix.as_str())
    }
}

fn generate_config(module: &str, features: Features) -> String {
    let mut fields = vec![
        vec!["Addr".to_string(), "string".to_string()],
        vec!["DatabaseURL".to_string(), "string".to_string()],
    ];
    let mut values = vec![
        vec!["Addr:".to_string(), "getenv(\"ADDR\", \":8080\"),".to_string()],
        vec!["DatabaseURL:".to_string(), "os.Getenv(\"DATABASE_URL\"),".to_string()],
    ];
    let mut checks = String::from(
        "\tif cfg.DatabaseURL == \"\" {\n\t\treturn cfg, errors.New(\"DATABASE_URL is not set\")\n\t}\n",
    );
    if features.auth {
        fields.push(vec!["JWTSecret".to_string(), "string".to_string()]);
        values.push(vec!["JWTSecret:".to_string(), "os.Getenv(\"JWT_SECRET\"),".to_string()]);
        checks.push_str(
            "\tif cfg.JWTSecret == \"\" {\n\t\treturn cfg, errors.New(\"JWT_SECRET is not set\")\n\t}\n",
        );
    }
    if features.storage {
        fields.push(vec!["UploadDir".to_string(), "string".to_string()]);
        values.push(vec![
            "UploadDir:".to_string(),
            "getenv(\"UPLOAD_DIR\", \"uploads\"),".to_string(),
        ]);
    }

    format!(
        r#"package config

{imports}
// Config is read from the environment.
type Config struct {{
{fields}}}

// Load reads the configuration, failing when a required variable is unset.
func Load() (Config, error) {{
	cfg := Config{{
{values}	}}
{checks}	return cfg, nil
}}

func getenv(key, fallback string) string {{
	if v, ok := os.LookupEnv(key); ok {{
		return v
	}}
	return fallback
}}
"#,
        imports = imports(module, &["errors", "os"]),
        fields = align(&fields, "\t"),
        values = align(&values, "\t\t"),
    )
}

fn generate_deps(module: &str, entities: &[Entity<'_>], features: Features) -> String {
    let mut rows: Vec<Vec<String>> = entities
        .iter()
        .map(|e| {
            vec![
                e.names.pascal_plural.clone(),
                format!("*service.{}Service", e.names.pascal),
            ]
        })
        .collect();
    let mut paths = Vec::new();
    if !entities.is_empty() {
        paths.push(format!("{module}/internal/service"));
    }
    if features.auth {
        rows.push(vec!["Auth".to_string(), "*auth.Service".to_string()]);
        paths.push(format!("{module}/internal/auth"));
    }
    if features.storage {
        rows.push(vec!["Files".to_string(), "*storage.Local".to_string()]);
        paths.push(format!("{module}/internal/storage"));
    }
    let import_block = if paths.is_empty() {
        String::new()
    } else {
        format!("{}\n", imports(module, &paths))
    };
    format!(
        "package handlers\n\n{import_block}// Deps are the services the router exposes.\ntype Deps struct {{\n{}}}\n",
        align(&rows, "\t")
    )
}

fn generate_main(module: &str, entities: &[Entity<'_>], features: Features) -> String {
    let mut paths = vec![
        "log/slog".to_string(),
        "net/http".to_string(),
        "os".to_string(),
        format!("{module}/internal/config"),
        format!("{module}/internal/database"),
        format!("{module}/internal/handlers"),
    ];
    if !entities.is_empty() {
        paths.push(format!("{module}/internal/repository"));
        paths.push(format!("{module}/internal/service"));
    }

    let rows: Vec<Vec<String>> = entities
        .iter()
        .map(|e| {
            vec![
                format!("{}:", e.names.pascal_plural),
                format!(
                    "service.New{0}Service(repository.New{0}Repository(db)),",
                    e.names.pascal
                ),
            ]
        })
        .collect();
    let deps = if rows.is_empty() {
        "\tdeps := handlers.Deps{}\n".to_string()
    } else {
        format!("\tdeps := handlers.Deps{{\n{}\t}}\n", align(&rows, "\t\t"))
    };

    let mut features_code = String::new();
    if features.auth {
        paths.push("time".to_string());
        paths.push(format!("{module}/internal/auth"));
        features_code.push_str(
            "\tdeps.Auth = auth.NewService(db, auth.NewTokens(cfg.JWTSecret, 24*time.Hour))\n",
        );
    }
    if features.storage {
        paths.push(format!("{module}/internal/storage"));
        features_code.push_str(
            "\tfiles, err := storage.NewLocal(cfg.UploadDir)\n\tif err != nil {\n\t\treturn err\n\t}\n\tdeps.Files = files\n",
        );
    }

    format!(
        r#"package main

{imports}
func main() {{
	slog.SetDefault(slog.New(slog.NewTextHandler(os.Stderr, nil)))
	if err := run(); err != nil {{
		slog.Error("server stopped", "err", err)
		os.Exit(1)
	}}
}}

func run() error {{
	cfg, err := config.Load()
	if err != nil {{
		return err
	}}
	db, err := database.Open(cfg.DatabaseURL)
	if err != nil {{
		return err
	}}
	if err := database.Migrate(db); err != nil {{
		return err
	}}

{deps}{features_code}
	slog.Info("listening", "addr", cfg.Addr)
	return http.ListenAndServe(cfg.Addr, handlers.NewRouter(deps))
}}
"#,
        imports = imports(module, &paths),
    )
}

fn generate_env(options: &GeneratorOptions, features: Features) -> String {
    let mut out = format!("ADDR=:8080\nDATABASE_URL={}\n", example_dsn(options));
    if features.auth {
        out.push_str("JWT_SECRET=change-me\n");
    }
    if features.storage {
        out.push_str("UPLOAD_DIR=uploads\n");
    }
    out
}

fn generate_readme(
    entities: &[Entity<'_>],
    options: &GeneratorOptions,
    framework: Framework,
    features: Features,
) -> String {
    let mut out = format!(
        "# {}\n\nGo / {} service generated by crudforge ({} database).\n\n## Running\n\n```sh\ncp .env.example .env\ngo mod tidy\nset -a && . ./.env && set +a\ngo run ./cmd/server\n```\n\n## Resources\n\n",
        options.project_name,
        framework.title(),
        options.database
    );
    for entity in entities {
        out.push_str(&format!(
            "- `{}` ({})\n",
            options.route(&entity.names.route),
            entity.names.pascal
        ));
    }
    if features.auth {
        out.push_str(&format!(
            "\nRegister or log in at `{}` to obtain a bearer token.\n",
            options.route("auth")
        ));
    }
    if features.storage {
        out.push_str(&format!(
            "\nFiles are uploaded to `{}` and stored under `UPLOAD_DIR`.\n",
            options.route("files")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{entities, test_support::blog};

    #[test]
    fn test_parse_id() {
        let schema = blog();
        let all = entities(&schema);
        let (code, import) = parse_id(&all[2]);
        assert_eq!(import, "strconv");
        assert!(code.starts_with("func parseTagID(raw string) (int32, error) {"));
        assert!(code.contains("return int32(v), err"));
    }

    #[test]
    fn test_config_follows_features() {
        let code = generate_config("app", Features { auth: true, storage: false });
        assert!(code.contains("\tJWTSecret   string\n"));
        assert!(code.contains("errors.New(\"JWT_SECRET is not set\")"));
        assert!(!code.contains("UploadDir"));
    }

    #[test]
    fn test_main_wires_services() {
        let schema = blog();
        let all = entities(&schema);
        let code = generate_main("app", &all, Features { auth: true, storage: true });
        assert!(code.contains("\t\tPosts:    service.NewPostService(repository.NewPostRepository(db)),\n"));
        assert!(code.contains("deps.Auth = auth.NewService("));
        assert!(code.contains("files, err := storage.NewLocal(cfg.UploadDir)"));
        assert!(code.contains("\t\"app/internal/auth\"\n"));
    }
}
