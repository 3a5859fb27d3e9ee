//! Pass-based code generation architecture.
//!
//! A pass reads the schema and adds or rewrites files in the shared
//! [`GenerationContext`]. The [`PassManager`] runs passes in dependency
//! order, so a pass can rely on the files and metadata left by the passes it
//! depends on.
//!
//! # Example
//!
//! ```ignore
//! use crudforge_codegen::pass::PassManager;
//! use crudforge_codegen::rust::{RustBasePass, passes::{RustDataPass, AxumPass}};
//!
//! let mut pm = PassManager::new();
//! pm.add(RustBasePass);
//! pm.add(RustDataPass);
//! pm.add(AxumPass);
//!
//! let files = pm.run(&schema)?;
//! ```

use std::collections::{BTreeMap, HashMap};

use crudforge_schema::SqlSchema;
use tracing::debug;

use crate::options::GeneratorOptions;
use crate::{CodegenError, GeneratedFile, GeneratedFiles};

/// Mutable state passed through the pipeline.
///
/// This context accumulates generated files, imports, derives and metadata
/// as passes execute. All maps are ordered so that the output does not
/// depend on insertion order.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    /// Generated files keyed by relative path.
    pub files: BTreeMap<String, GeneratedFile>,

    /// Import lines to inject into specific files.
    pub imports: BTreeMap<String, Vec<String>>,

    /// Derives to add to structs (Rust).
    pub derives: BTreeMap<String, Vec<String>>,

    /// Arbitrary metadata for pass communication.
    pub metadata: BTreeMap<String, String>,

    /// Options for the project being generated.
    pub options: GeneratorOptions,
}

impl GenerationContext {
    /// Creates a new empty generation context with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty generation context.
    pub fn with_options(options: GeneratorOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Add or replace a file.
    pub fn set_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        self.files
            .insert(path.clone(), GeneratedFile::new(path, content.into()));
    }

    /// Get a file's content for reading.
    pub fn get_file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|f| f.content.as_str())
    }

    /// Get a file's content for modification.
    pub fn get_file_mut(&mut self, path: &str) -> Option<&mut String> {
        self.files.get_mut(path).map(|f| &mut f.content)
    }

    /// Check if a file exists.
    pub fn has_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Add an import to a file. Duplicates are dropped when finalizing.
    pub fn add_import(&mut self, file: impl Into<String>, import: impl Into<String>) {
        self.imports
            .entry(file.into())
            .or_default()
            .push(import.into());
    }

    /// Get imports for a file.
    pub fn get_imports(&self, file: &str) -> Option<&[String]> {
        self.imports.get(file).map(|v| v.as_slice())
    }

    /// Add a derive macro to a struct (Rust).
    pub fn add_derive(&mut self, struct_name: impl Into<String>, derive: impl Into<String>) {
        let derives = self.derives.entry(struct_name.into()).or_default();
        let derive = derive.into();
        if !derives.contains(&derive) {
            derives.push(derive);
        }
    }

    /// Get derives for a struct.
    pub fn get_derives(&self, struct_name: &str) -> Option<&[String]> {
        self.derives.get(struct_name).map(|v| v.as_slice())
    }

    /// Set a metadata value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Get a metadata value.
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    /// Check if a metadata key exists.
    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// Returns all metadata entries whose key starts with `prefix`, with the prefix removed.
    pub fn metadata_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.metadata
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(move |(k, v)| (&k[prefix.len()..], v.as_str()))
    }

    /// Finalize into GeneratedFiles.
    ///
    /// Injects the registered imports after each file's header (leading
    /// comments plus `package`/`namespace` declarations) and returns the
    /// files sorted by path.
    pub fn finalize(mut self) -> GeneratedFiles {
        for (file_path, imports) in &self.imports {
            let Some(file) = self.files.get_mut(file_path) else {
                continue;
            };

            let mut imports: Vec<&str> = imports.iter().map(|s| s.as_str()).collect();
            imports.sort_unstable();
            imports.dedup();
            if imports.is_empty() {
                continue;
            }

            let had_trailing_newline = file.content.ends_with('\n');
            let mut lines: Vec<&str> = file.content.lines().collect();
            let insert_pos = lines
                .iter()
                .position(|line| !is_header_line(line))
                .unwrap_or(lines.len());

            let mut block: Vec<&str> = imports;
            block.push("");
            lines.splice(insert_pos..insert_pos, block);

            let mut content = lines.join("\n");
            if had_trailing_newline {
                content.push('\n');
            }
            file.content = content;
        }

        let mut result = GeneratedFiles::new();
        for file in self.files.into_values() {
            result.add(file);
        }
        result
    }
}

/// Lines that must stay above an injected import block.
fn is_header_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.starts_with("//")
        || trimmed.starts_with('#')
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
        || trimmed.starts_with("\"\"\"")
        || trimmed.starts_with("<?php")
        || trimmed.starts_with("declare(")
        || trimmed.starts_with("package ")
        || trimmed.starts_with("namespace ")
}

/// A pass that transforms the generation context.
///
/// Passes are the building blocks of the code generation pipeline.
/// Each pass can read the schema and modify the generation context
/// to produce or enhance generated files.
pub trait Pass: Send + Sync {
    /// Unique identifier for this pass.
    fn name(&self) -> &'static str;

    /// Execute the pass, mutating the context.
    fn run(&self, schema: &SqlSchema, ctx: &mut GenerationContext) -> Result<(), CodegenError>;

    /// Dependencies: passes that must run before this one.
    ///
    /// Dependencies on passes that are not part of the pipeline are
    /// ignored, which is how optional feature passes are left out.
    fn depends_on(&self) -> &[&'static str] {
        &[]
    }
}

/// Manages pass execution order and dependencies.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
    options: GeneratorOptions,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Creates a new empty pass manager with default options.
    pub fn new() -> Self {
        Self::with_options(GeneratorOptions::default())
    }

    /// Creates a new empty pass manager for a project with `options`.
    pub fn with_options(options: GeneratorOptions) -> Self {
        Self {
            passes: vec![],
            options,
        }
    }

    /// Add a pass to the pipeline.
    ///
    /// Returns `&mut Self` for method chaining.
    pub fn add<P: Pass + 'static>(&mut self, pass: P) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Returns the names of the passes in execution order.
    pub fn pass_names(&self) -> Result<Vec<&'static str>, CodegenError> {
        Ok(self
            .topological_sort()?
            .into_iter()
            .map(|i| self.passes[i].name())
            .collect())
    }

    /// Run all passes in dependency order.
    ///
    /// This method:
    /// 1. Topologically sorts passes by their dependencies
    /// 2. Executes each pass in order
    /// 3. Finalizes the context into GeneratedFiles
    pub fn run(&self, schema: &SqlSchema) -> Result<GeneratedFiles, CodegenError> {
        let mut ctx = GenerationContext::with_options(self.options.clone());

        let sorted = self.topological_sort()?;

        for pass_idx in sorted {
            let pass = &self.passes[pass_idx];
            let before = ctx.files.len();
            pass.run(schema, &mut ctx)?;
            debug!(
                pass = pass.name(),
                added = ctx.files.len().saturating_sub(before),
                total = ctx.files.len(),
                "pass completed"
            );

            ctx.set_metadata(format!("pass:{}:completed", pass.name()), "true");
        }

        Ok(ctx.finalize())
    }

    /// Topologically sort passes by dependencies.
    ///
    /// Ties are broken by insertion order, so the result is stable.
    fn topological_sort(&self) -> Result<Vec<usize>, CodegenError> {
        let name_to_idx: HashMap<&str, usize> = self
            .passes
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name(), i))
            .collect();

        let mut in_degree = vec![0usize; self.passes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![vec![]; self.passes.len()];

        for (i, pass) in self.passes.iter().enumerate() {
            for dep_name in pass.depends_on() {
                if let Some(&dep_idx) = name_to_idx.get(dep_name) {
                    dependents[dep_idx].push(i);
                    in_degree[i] += 1;
                }
            }
        }

        // Kahn's algorithm
        let mut ready: Vec<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut result = Vec::with_capacity(self.passes.len());

        while !ready.is_empty() {
            let idx = ready.remove(0);
            result.push(idx);
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    let pos = ready.partition_point(|&r| r < dependent);
                    ready.insert(pos, dependent);
                }
            }
        }

        if result.len() != self.passes.len() {
            return Err(CodegenError::Custom(
                "Circular dependency detected in passes".to_string(),
            ));
        }

        Ok(result)
    }

    /// Get the number of passes in the manager.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Check if the manager has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}
