//! Runs every target over the blog fixture.

use std::path::Component;

use crudforge_codegen::{generate, CodegenError, GeneratedFiles, GeneratorOptions, Target};
use crudforge_schema::SqlSchema;

const BLOG_SQL: &str = include_str!("fixtures/blog.sql");

fn blog() -> SqlSchema {
    crudforge_parser::parse(BLOG_SQL).unwrap()
}

fn run(target: Target, options: &GeneratorOptions) -> GeneratedFiles {
    generate(&blog(), target, options).unwrap()
}

fn expected_paths(target: Target) -> &'static [&'static str] {
    match target {
        Target::JavaSpring => &[
            "pom.xml",
            "src/main/java/com/example/app/entity/Post.java",
            "src/main/resources/application.yml",
        ],
        Target::CSharpAspNet => &[
            "src/App/App.csproj",
            "src/App/Models/Post.cs",
            "src/App/Program.cs",
        ],
        Target::GoGin | Target::GoChi => &[
            "go.mod",
            "cmd/server/main.go",
            "internal/handlers/post.go",
            "internal/models/post.go",
        ],
        Target::RustAxum => &[
            "Cargo.toml",
            "migrations/0001_init.sql",
            "src/handlers/post.rs",
            "src/main.rs",
        ],
        Target::TypeScriptNestJs => &[
            "package.json",
            "src/main.ts",
            "src/posts/posts.controller.ts",
        ],
        Target::PhpLaravel => &[
            "composer.json",
            "app/Models/Post.php",
            "routes/api.php",
        ],
        Target::PythonFastApi => &[
            "requirements.txt",
            "app/main.py",
            "app/models/post.py",
            "app/routers/posts.py",
        ],
    }
}

#[test]
fn test_every_target_emits_expected_files() {
    let options = GeneratorOptions::default();
    for &target in Target::all() {
        let files = run(target, &options);
        for path in expected_paths(target) {
            assert!(files.get(path).is_some(), "{target}: missing {path}");
        }
        assert!(files.get("README.md").is_some(), "{target}: missing README.md");
    }
}

#[test]
fn test_generation_is_deterministic() {
    let options = GeneratorOptions::default();
    for &target in Target::all() {
        assert_eq!(run(target, &options), run(target, &options), "{target}");
    }
}

#[test]
fn test_paths_are_relative_and_sorted() {
    let options = GeneratorOptions::default();
    for &target in Target::all() {
        let files = run(target, &options);
        for file in &files.files {
            assert!(
                file.path.components().all(|c| matches!(c, Component::Normal(_))),
                "{target}: {}",
                file.path.display()
            );
        }
        let paths: Vec<String> = files
            .files
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted, "{target}");
    }
}

#[test]
fn test_join_and_keyless_tables_get_no_entity() {
    let options = GeneratorOptions::default();
    let files = run(Target::PythonFastApi, &options);
    assert!(files.get("app/models/post_tag.py").is_none());
    assert!(files
        .get("app/models/associations.py")
        .unwrap()
        .content
        .contains("post_tags = Table("));

    let files = run(Target::JavaSpring, &options);
    assert!(files
        .files
        .iter()
        .all(|f| !f.path.to_string_lossy().contains("PostTag")));
}

#[test]
fn test_features_can_be_turned_off() {
    let mut options = GeneratorOptions::default();
    options.auth = false;
    options.storage = false;
    options.tests = false;

    let python = run(Target::PythonFastApi, &options);
    assert!(python.get("app/auth/router.py").is_none());
    assert!(python.get("app/routers/files.py").is_none());
    assert!(python.get("tests/conftest.py").is_none());

    let php = run(Target::PhpLaravel, &options);
    assert!(php.get("app/Http/Controllers/Api/AuthController.php").is_none());
    assert!(!php.get("routes/api.php").unwrap().content.contains("auth:api"));

    let go = run(Target::GoChi, &options);
    assert!(go.get("internal/auth/token.go").is_none());
}

#[test]
fn test_options_flow_into_projects() {
    let mut options = GeneratorOptions::default();
    options.set("project_name", "journal").unwrap();
    options.set("database", "sqlite").unwrap();
    options.set("api_prefix", "v1").unwrap();

    let python = run(Target::PythonFastApi, &options);
    let config = &python.get("app/config.py").unwrap().content;
    assert!(config.contains("api_prefix: str = \"/v1\""));
    assert!(config.contains("sqlite:///./journal.db"));

    let php = run(Target::PhpLaravel, &options);
    assert!(php.get("composer.json").unwrap().content.contains("\"name\": \"journal/journal\""));
}

#[test]
fn test_column_names_that_are_not_identifiers() {
    let schema = crudforge_parser::parse(
        r#"CREATE TABLE accounts (
            id BIGSERIAL PRIMARY KEY,
            "2fa_enabled" BOOLEAN NOT NULL,
            price$usd NUMERIC(8, 2)
        );"#,
    )
    .unwrap();
    let options = GeneratorOptions::default();
    for &target in Target::all() {
        assert!(generate(&schema, target, &options).is_ok(), "{target}");
    }

    let files = generate(&schema, Target::RustAxum, &options).unwrap();
    for file in files.files.iter().filter(|f| f.path.extension().is_some_and(|e| e == "rs")) {
        syn::parse_file(&file.content)
            .unwrap_or_else(|e| panic!("{}: {e}", file.path.display()));
    }
    let model = &files.get("src/models/account.rs").unwrap().content;
    assert!(model.contains("pub f_2fa_enabled: bool,"));
    assert!(model.contains("#[sqlx(rename = \"2fa_enabled\")]"));
    assert!(model.contains("pub price_usd: Option<rust_decimal::Decimal>,"));

    let python = generate(&schema, Target::PythonFastApi, &options).unwrap();
    let model = &python.get("app/models/account.py").unwrap().content;
    assert!(model.contains("    f_2fa_enabled: Mapped[bool] = mapped_column(\"2fa_enabled\", "));
}

#[test]
fn test_self_referential_join_table() {
    let schema = crudforge_parser::parse(
        r#"
        CREATE TABLE users (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL);
        CREATE TABLE follows (
            follower_id BIGINT NOT NULL REFERENCES users(id),
            followee_id BIGINT NOT NULL REFERENCES users(id),
            PRIMARY KEY (follower_id, followee_id)
        );
    "#,
    )
    .unwrap();
    let options = GeneratorOptions::default();
    for &target in Target::all() {
        assert!(generate(&schema, target, &options).is_ok(), "{target}");
    }
    let files = generate(&schema, Target::CSharpAspNet, &options).unwrap();
    let user = &files.get("src/App/Models/User.cs").unwrap().content;
    assert!(user.contains("public ICollection<User> Followees { get; set; }"));
    assert!(user.contains(
        "    [InverseProperty(nameof(User.Followees))]\n    public ICollection<User> Followers { get; set; }"
    ));
}

#[test]
fn test_invalid_schema_is_rejected() {
    let schema = crudforge_parser::parse(
        "CREATE TABLE posts (id SERIAL PRIMARY KEY, author_id INT REFERENCES users(id));",
    )
    .unwrap();
    let err = generate(&schema, Target::RustAxum, &GeneratorOptions::default()).unwrap_err();
    assert!(matches!(err, CodegenError::InvalidSchema(_)));
}

#[test]
fn test_write_to_creates_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let files = run(Target::PythonFastApi, &GeneratorOptions::default());
    files.write_to(dir.path()).unwrap();

    for file in &files.files {
        let written = std::fs::read_to_string(dir.path().join(&file.path)).unwrap();
        assert_eq!(written, file.content);
    }
}
