//! Config file discovery and option layering.

use std::path::{Path, PathBuf};

use crudforge_codegen::{CodegenError, GeneratorOptions};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// The project-local config file name, looked up next to the input schema.
pub const FILE_NAME: &str = "crudforge.toml";

/// Errors raised while loading a config file or applying overrides.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Option(#[from] CodegenError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    generator: GeneratorOptions,
}

/// Finds the config file that applies to a run.
pub struct ConfigLoader {
    /// Given with `--config`; it must exist.
    explicit: Option<PathBuf>,
    /// Directory of the input schema.
    project_dir: Option<PathBuf>,
    /// `<config_dir>/crudforge`.
    user_dir: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            explicit: None,
            project_dir: None,
            user_dir: dirs::config_dir().map(|p| p.join("crudforge")),
        }
    }

    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    pub fn with_project_dir(mut self, dir: &Path) -> Self {
        self.project_dir = Some(dir.to_path_buf());
        self
    }

    #[cfg(test)]
    fn with_user_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_dir = dir;
        self
    }

    /// The first config file that applies, if any.
    pub fn find(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return Some(path.clone());
        }
        let project = self.project_dir.as_ref().map(|d| d.join(FILE_NAME));
        let user = self.user_dir.as_ref().map(|d| d.join("config.toml"));
        [project, user].into_iter().flatten().find(|p| p.is_file())
    }

    /// Defaults overlaid with the `[generator]` table of the config file.
    pub fn load(&self) -> Result<GeneratorOptions, ConfigError> {
        let Some(path) = self.find() else {
            return Ok(GeneratorOptions::default());
        };
        debug!(path = %path.display(), "loading config");
        let source = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let file: ConfigFile =
            toml::from_str(&source).map_err(|source| ConfigError::Parse { path, source })?;
        let mut options = file.generator;
        options.validate()?;
        Ok(options)
    }
}

/// Option values given on the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub name: Option<String>,
    pub package: Option<String>,
    pub database: Option<String>,
    pub no_auth: bool,
    pub no_storage: bool,
    pub no_tests: bool,
    /// `--set key=value` pairs, applied last in order.
    pub set: Vec<(String, String)>,
}

impl Overrides {
    pub fn apply(&self, options: &mut GeneratorOptions) -> Result<(), ConfigError> {
        if let Some(name) = &self.name {
            options.set("project_name", name)?;
        }
        if let Some(package) = &self.package {
            options.set("package", package)?;
        }
        if let Some(database) = &self.database {
            options.set("database", database)?;
        }
        if self.no_auth {
            options.auth = false;
        }
        if self.no_storage {
            options.storage = false;
        }
        if self.no_tests {
            options.tests = false;
        }
        for (key, value) in &self.set {
            options.set(key, value)?;
        }
        Ok(())
    }
}

/// Parses a `key=value` argument.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid option format: '{s}', expected key=value"))?;
    Ok((key.trim().to_string(), value.to_string()))
}
