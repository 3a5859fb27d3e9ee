//! Java / Spring Boot 3 code generation passes.
//!
//! Sources are assembled with `format!` over raw-string templates. Type
//! imports (`java.time.*`, `java.math.BigDecimal`, ...) are registered with
//! [`GenerationContext::add_import`] and injected after the `package` line
//! when the context is finalized. Maven dependencies are recorded as
//! `maven:dep:<group>:<artifact>` metadata and `pom.xml` is re-rendered from
//! them by every pass that adds one.

pub mod base;
pub mod passes;

pub use base::JavaBasePass;

use crate::model::Entity;
use crate::options::{Database, GeneratorOptions};
use crate::pass::{GenerationContext, PassManager};
use crate::types::{JavaTypes, TypeMapper};

/// Creates a PassManager with the Spring Boot stack.
pub fn spring_stack(options: &GeneratorOptions) -> PassManager {
    let mut pm = PassManager::with_options(options.clone());
    pm.add(JavaBasePass);
    pm.add(passes::JavaDataPass);
    pm.add(passes::SpringWebPass);
    if options.auth {
        pm.add(passes::JavaAuthPass);
    }
    if options.storage {
        pm.add(passes::JavaStoragePass);
    }
    if options.tests {
        pm.add(passes::JavaTestsPass);
    }
    pm
}

const SPRING_BOOT_VERSION: &str = "3.3.4";

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface",
    "long", "native", "new", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "try", "void", "volatile", "while", "record", "var", "yield",
];

/// A Java identifier for a camelCase name.
pub(crate) fn java_ident(camel: &str) -> String {
    if JAVA_KEYWORDS.contains(&camel) {
        format!("{camel}Value")
    } else {
        camel.to_string()
    }
}

/// `src/main/java/<package>/<sub>/<class>.java`
pub(crate) fn source_path(options: &GeneratorOptions, sub: &str, class: &str) -> String {
    if sub.is_empty() {
        format!("src/main/java/{}/{class}.java", options.package_path())
    } else {
        format!("src/main/java/{}/{sub}/{class}.java", options.package_path())
    }
}

/// `src/test/java/<package>/<sub>/<class>.java`
pub(crate) fn test_path(options: &GeneratorOptions, sub: &str, class: &str) -> String {
    format!("src/test/java/{}/{sub}/{class}.java", options.package_path())
}

/// Registers the imports the entity's column types need in `file`.
pub(crate) fn add_type_imports(ctx: &mut GenerationContext, file: &str, entity: &Entity<'_>) {
    for field in &entity.fields {
        if let Some(import) = JavaTypes.import_for(&field.column.sql_type) {
            ctx.add_import(file, format!("import {import};"));
        }
    }
}

/// Registers the import of the entity's key type, if it needs one.
pub(crate) fn add_id_import(ctx: &mut GenerationContext, file: &str, entity: &Entity<'_>) {
    if let Some(import) = JavaTypes.import_for(&entity.id.column.sql_type) {
        ctx.add_import(file, format!("import {import};"));
    }
}

/// The Java type of the entity's id.
pub(crate) fn id_type(entity: &Entity<'_>) -> String {
    JavaTypes.map(&entity.id.column.sql_type)
}

/// Records a Maven dependency. An empty version is managed by the Boot parent.
pub(crate) fn add_maven_dep(
    ctx: &mut GenerationContext,
    coordinates: &str,
    version: &str,
    scope: &str,
) {
    ctx.set_metadata(format!("maven:dep:{coordinates}"), format!("{version}|{scope}"));
}

fn driver(database: Database) -> &'static str {
    match database {
        Database::Postgres => "org.postgresql:postgresql",
        Database::Mysql => "com.mysql:mysql-connector-j",
        Database::Sqlite => "org.xerial:sqlite-jdbc",
    }
}

/// Adds the JDBC driver and, for SQLite, the Hibernate community dialect.
pub(crate) fn add_driver_deps(ctx: &mut GenerationContext) {
    let database = ctx.options.database;
    add_maven_dep(ctx, driver(database), "", "runtime");
    if database == Database::Sqlite {
        add_maven_dep(ctx, "org.hibernate.orm:hibernate-community-dialects", "", "runtime");
    }
}

/// Renders `pom.xml` from the `maven:dep:` metadata.
pub(crate) fn render_pom(ctx: &mut GenerationContext) {
    let opts = &ctx.options;
    let group = opts
        .package
        .rsplit_once('.')
        .map_or(opts.package.as_str(), |(group, _)| group);
    let artifact = &opts.project_name;

    let mut deps = String::new();
    for (coordinates, value) in ctx.metadata_with_prefix("maven:dep:") {
        let Some((group_id, artifact_id)) = coordinates.split_once(':') else {
            continue;
        };
        let (version, scope) = value.split_once('|').unwrap_or((value, ""));
        deps.push_str(&format!(
            "        <dependency>\n            <groupId>{group_id}</groupId>\n            <artifactId>{artifact_id}</artifactId>\n"
        ));
        if !version.is_empty() {
            deps.push_str(&format!("            <version>{version}</version>\n"));
        }
        if !scope.is_empty() && scope != "compile" {
            deps.push_str(&format!("            <scope>{scope}</scope>\n"));
        }
        deps.push_str("        </dependency>\n");
    }

    let pom = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 https://maven.apache.org/xsd/maven-4.0.0.xsd">
    <modelVersion>4.0.0</modelVersion>

    <parent>
        <groupId>org.springframework.boot</groupId>
        <artifactId>spring-boot-starter-parent</artifactId>
        <version>{boot}</version>
        <relativePath/>
    </parent>

    <groupId>{group}</groupId>
    <artifactId>{artifact}</artifactId>
    <version>{version}</version>
    <name>{artifact}</name>

    <properties>
        <java.version>17</java.version>
    </properties>

    <dependencies>
{deps}    </dependencies>

    <build>
        <plugins>
            <plugin>
                <groupId>org.springframework.boot</groupId>
                <artifactId>spring-boot-maven-plugin</artifactId>
            </plugin>
        </plugins>
    </build>
</project>
"#,
        boot = SPRING_BOOT_VERSION,
        version = opts.version,
    );
    ctx.set_file("pom.xml", pom);
}
