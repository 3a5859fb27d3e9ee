//! Code generation backends for crudforge.
//!
//! Every target is a pipeline of passes over a shared [`GenerationContext`]:
//! 1. A base pass emits the project manifest, entities and DTOs
//! 2. A data pass adds repositories and services
//! 3. Feature passes (auth, storage, tests) add optional artifact families
//! 4. A web pass wires controllers, routes and the entry point, reading the
//!    `has:*` flags the feature passes leave in the context metadata
//!
//! # Example
//!
//! ```ignore
//! use crudforge_codegen::{generate, GeneratorOptions, Target};
//!
//! let schema = crudforge_parser::parse(&source)?;
//! let files = generate(&schema, Target::RustAxum, &GeneratorOptions::default())?;
//! files.write_to(std::path::Path::new("out"))?;
//! ```

use std::path::{Path, PathBuf};

use crudforge_schema::{validate, Severity, SqlSchema};
use thiserror::Error;
use tracing::{info, warn};

pub mod model;
pub mod naming;
pub mod options;
pub mod pass;
pub mod target;
pub mod types;

// Target backends
pub mod csharp;
pub mod go;
pub mod java;
pub mod php;
pub mod python;
pub mod rust;
pub mod typescript;

pub use options::{Database, GeneratorOptions};
pub use pass::{GenerationContext, Pass, PassManager};
pub use target::Target;

/// Errors that can occur during code generation.
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("invalid schema:\n{}", .0.join("\n"))]
    InvalidSchema(Vec<String>),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

/// A generated file with its path and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Relative path for the generated file.
    pub path: PathBuf,
    /// Content of the generated file.
    pub content: String,
}

impl GeneratedFile {
    /// Creates a new generated file.
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Result of code generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedFiles {
    /// The generated files, sorted by path.
    pub files: Vec<GeneratedFile>,
}

impl GeneratedFiles {
    /// Creates a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file to the result.
    pub fn add(&mut self, file: GeneratedFile) {
        self.files.push(file);
    }

    /// Looks up a file by its relative path.
    pub fn get(&self, path: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.path == Path::new(path))
    }

    /// Returns the number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if nothing was generated.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes all files to the given output directory.
    pub fn write_to(&self, output_dir: &Path) -> Result<(), std::io::Error> {
        for file in &self.files {
            validate_relative_path(&file.path)?;
            let path = output_dir.join(&file.path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, &file.content)?;
        }
        Ok(())
    }
}

fn validate_relative_path(path: &Path) -> Result<(), std::io::Error> {
    use std::path::Component;

    if path.is_absolute() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("generated file path must be relative: {}", path.display()),
        ));
    }

    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            // `..`, `.`, prefixes and root dirs would escape `output_dir`.
            Component::ParentDir | Component::CurDir | Component::Prefix(_) | Component::RootDir => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!(
                        "generated file path must be a normal relative path: {}",
                        path.display()
                    ),
                ));
            }
        }
    }

    Ok(())
}

/// Validates `schema` and runs the pipeline for `target`.
///
/// Error-severity validation issues abort generation with
/// [`CodegenError::InvalidSchema`]. Warnings are logged.
pub fn generate(
    schema: &SqlSchema,
    target: Target,
    options: &GeneratorOptions,
) -> Result<GeneratedFiles, CodegenError> {
    let issues = validate(schema);
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .map(|i| i.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(CodegenError::InvalidSchema(errors));
    }
    for issue in issues.iter().filter(|i| i.severity == Severity::Warning) {
        warn!(location = %issue.location, "{}", issue.message);
    }

    let files = target.pipeline(options).run(schema)?;
    info!(target = %target, files = files.len(), "generated project");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crudforge_schema::{ForeignKey, SqlColumn, SqlTable, SqlType};

    #[test]
    fn test_validate_relative_path() {
        assert!(validate_relative_path(Path::new("src/main.rs")).is_ok());
        assert!(validate_relative_path(Path::new("/etc/passwd")).is_err());
        assert!(validate_relative_path(Path::new("../escape.txt")).is_err());
        assert!(validate_relative_path(Path::new("./here.txt")).is_err());
        assert!(validate_relative_path(Path::new("a/../../b")).is_err());
    }

    #[test]
    fn test_generated_files_get() {
        let mut files = GeneratedFiles::new();
        files.add(GeneratedFile::new("a/b.txt", "x"));
        assert_eq!(files.get("a/b.txt").map(|f| f.content.as_str()), Some("x"));
        assert!(files.get("a/c.txt").is_none());
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_generate_rejects_invalid_schema() {
        let mut table = SqlTable::new("posts");
        let mut id = SqlColumn::new("id", SqlType::BigInt);
        id.primary_key = true;
        table.columns.push(id);
        table.primary_key = vec!["id".to_string()];
        table.foreign_keys.push(ForeignKey {
            name: None,
            columns: vec!["id".to_string()],
            ref_table: "missing".to_string(),
            ref_columns: vec!["id".to_string()],
            on_delete: None,
            on_update: None,
        });
        let schema = SqlSchema {
            tables: vec![table],
        };

        let err = generate(&schema, Target::GoGin, &GeneratorOptions::default()).unwrap_err();
        match err {
            CodegenError::InvalidSchema(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("unknown table 'missing'"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
