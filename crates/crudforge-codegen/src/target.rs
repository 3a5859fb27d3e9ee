//! Supported generation targets.

use std::fmt;
use std::str::FromStr;

use crate::options::GeneratorOptions;
use crate::pass::PassManager;
use crate::{csharp, go, java, php, python, rust, typescript, CodegenError};

/// A language/framework combination crudforge can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    JavaSpring,
    CSharpAspNet,
    GoGin,
    GoChi,
    RustAxum,
    TypeScriptNestJs,
    PhpLaravel,
    PythonFastApi,
}

impl Target {
    /// Every target, in listing order.
    pub fn all() -> &'static [Target] {
        &[
            Target::JavaSpring,
            Target::CSharpAspNet,
            Target::GoGin,
            Target::GoChi,
            Target::RustAxum,
            Target::TypeScriptNestJs,
            Target::PhpLaravel,
            Target::PythonFastApi,
        ]
    }

    /// The canonical id, e.g. `rust-axum`.
    pub fn id(&self) -> &'static str {
        match self {
            Target::JavaSpring => "java-spring",
            Target::CSharpAspNet => "csharp-aspnet",
            Target::GoGin => "go-gin",
            Target::GoChi => "go-chi",
            Target::RustAxum => "rust-axum",
            Target::TypeScriptNestJs => "typescript-nestjs",
            Target::PhpLaravel => "php-laravel",
            Target::PythonFastApi => "python-fastapi",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Target::JavaSpring => "Java 17 / Spring Boot 3 with Spring Data JPA",
            Target::CSharpAspNet => "C# / ASP.NET Core 8 with Entity Framework Core",
            Target::GoGin => "Go / Gin with GORM",
            Target::GoChi => "Go / Chi with GORM",
            Target::RustAxum => "Rust / Axum with SQLx",
            Target::TypeScriptNestJs => "TypeScript / NestJS with TypeORM",
            Target::PhpLaravel => "PHP / Laravel with Eloquent",
            Target::PythonFastApi => "Python / FastAPI with SQLAlchemy 2.0",
        }
    }

    /// Builds the pass pipeline for this target.
    ///
    /// Optional feature passes are only added when the options enable them.
    pub fn pipeline(&self, options: &GeneratorOptions) -> PassManager {
        match self {
            Target::JavaSpring => java::spring_stack(options),
            Target::CSharpAspNet => csharp::aspnet_stack(options),
            Target::GoGin => go::gin_stack(options),
            Target::GoChi => go::chi_stack(options),
            Target::RustAxum => rust::axum_stack(options),
            Target::TypeScriptNestJs => typescript::nestjs_stack(options),
            Target::PhpLaravel => php::laravel_stack(options),
            Target::PythonFastApi => python::fastapi_stack(options),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Target {
    type Err = CodegenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "java-spring" | "spring" | "java" => Ok(Target::JavaSpring),
            "csharp-aspnet" | "aspnet" | "dotnet" | "csharp" => Ok(Target::CSharpAspNet),
            "go-gin" | "gin" => Ok(Target::GoGin),
            "go-chi" | "chi" => Ok(Target::GoChi),
            "rust-axum" | "axum" | "rust" => Ok(Target::RustAxum),
            "typescript-nestjs" | "nestjs" | "nest" => Ok(Target::TypeScriptNestJs),
            "php-laravel" | "laravel" | "php" => Ok(Target::PhpLaravel),
            "python-fastapi" | "fastapi" | "python" => Ok(Target::PythonFastApi),
            _ => Err(CodegenError::UnknownTarget(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for target in Target::all() {
            assert_eq!(target.id().parse::<Target>().unwrap(), *target);
            assert_eq!(target.to_string(), target.id());
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("spring".parse::<Target>().unwrap(), Target::JavaSpring);
        assert_eq!("DOTNET".parse::<Target>().unwrap(), Target::CSharpAspNet);
        assert_eq!("chi".parse::<Target>().unwrap(), Target::GoChi);
        assert_eq!("nest".parse::<Target>().unwrap(), Target::TypeScriptNestJs);
        assert_eq!("python".parse::<Target>().unwrap(), Target::PythonFastApi);
    }

    #[test]
    fn test_unknown_target() {
        let err = "cobol".parse::<Target>().unwrap_err();
        assert!(matches!(err, CodegenError::UnknownTarget(ref t) if t == "cobol"));
    }

    #[test]
    fn test_pipelines_respect_features() {
        let full = GeneratorOptions::default();
        let mut bare = GeneratorOptions::default();
        bare.auth = false;
        bare.storage = false;
        bare.tests = false;

        for target in Target::all() {
            let all_passes = target.pipeline(&full).pass_names().unwrap();
            let few = target.pipeline(&bare).pass_names().unwrap();
            assert_eq!(all_passes.len(), 6, "{target}");
            assert_eq!(few.len(), 3, "{target}");
            assert!(all_passes[0].ends_with("-base"), "{target}");
            assert!(all_passes.iter().any(|p| p.ends_with("-auth")));
        }
    }

    #[test]
    fn test_web_pass_runs_after_features() {
        let names = Target::GoChi
            .pipeline(&GeneratorOptions::default())
            .pass_names()
            .unwrap();
        let web = names.iter().position(|n| *n == "go-chi").unwrap();
        let auth = names.iter().position(|n| *n == "go-auth").unwrap();
        let storage = names.iter().position(|n| *n == "go-storage").unwrap();
        assert!(auth < web && storage < web);
    }
}
