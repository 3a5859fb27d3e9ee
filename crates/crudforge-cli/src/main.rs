//! crudforge CLI tool.

mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use crudforge_codegen::{generate, GeneratorOptions, Target};
use crudforge_parser::{format_schema, parse};
use crudforge_schema::{validate, Severity, SqlSchema};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::{parse_key_value, ConfigLoader, Overrides};

#[derive(Parser)]
#[command(name = "crudforge")]
#[command(author, version, about = "Generates CRUD project skeletons from a SQL schema", long_about = None)]
struct Cli {
    /// Increase log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate projects from a SQL schema
    Generate(GenerateArgs),

    /// Parse and validate a SQL schema
    Check {
        /// Input .sql file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print a SQL schema as canonical DDL
    Fmt {
        /// Input .sql file
        input: PathBuf,

        /// Write output back to file (default: print to stdout)
        #[arg(short, long)]
        write: bool,
    },

    /// List available targets
    Targets,
}

#[derive(Args)]
struct GenerateArgs {
    /// Input .sql file
    #[arg(short, long)]
    input: PathBuf,

    /// Target id or alias (repeatable, `all` for every target)
    #[arg(short, long = "target", required = true)]
    targets: Vec<String>,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Config file (default: crudforge.toml next to the input)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Project name
    #[arg(long)]
    name: Option<String>,

    /// Java package / C# namespace base
    #[arg(long)]
    package: Option<String>,

    /// postgres, mysql or sqlite
    #[arg(long)]
    database: Option<String>,

    /// Skip authentication
    #[arg(long)]
    no_auth: bool,

    /// Skip file storage
    #[arg(long)]
    no_storage: bool,

    /// Skip generated tests
    #[arg(long)]
    no_tests: bool,

    /// Set an option (key=value)
    #[arg(long = "set", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// List the files without writing them
    #[arg(long)]
    dry_run: bool,

    /// Write into a non-empty output directory
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Generate(args) => run_generate(args),
        Commands::Check { input } => run_check(&input),
        Commands::Fmt { input, write } => run_fmt(&input, write),
        Commands::Targets => run_list_targets(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

/// Reads and parses a schema, reporting parse errors with their source span.
fn load_schema(input: &Path) -> Result<SqlSchema> {
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let filename = input.display().to_string();
    match parse(&source) {
        Ok(schema) => Ok(schema),
        Err(e) => {
            e.report(&filename, &source)?;
            bail!("failed to parse {filename}");
        }
    }
}

fn resolve_targets(names: &[String]) -> Result<Vec<Target>> {
    let mut targets = Vec::new();
    for name in names {
        if name.eq_ignore_ascii_case("all") {
            targets.extend_from_slice(Target::all());
        } else {
            targets.push(name.parse::<Target>()?);
        }
    }
    let mut seen = Vec::new();
    targets.retain(|t| {
        let fresh = !seen.contains(t);
        seen.push(*t);
        fresh
    });
    Ok(targets)
}

fn resolve_options(args: &GenerateArgs) -> Result<GeneratorOptions> {
    let project_dir = args
        .input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut options = ConfigLoader::new()
        .with_explicit(args.config.clone())
        .with_project_dir(&project_dir)
        .load()?;
    let overrides = Overrides {
        name: args.name.clone(),
        package: args.package.clone(),
        database: args.database.clone(),
        no_auth: args.no_auth,
        no_storage: args.no_storage,
        no_tests: args.no_tests,
        set: args.set.clone(),
    };
    overrides.apply(&mut options)?;
    debug!(?options, "resolved options");
    Ok(options)
}

fn is_non_empty_dir(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    let mut entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    Ok(entries.next().is_some())
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let schema = load_schema(&args.input)?;
    let options = resolve_options(&args)?;
    let targets = resolve_targets(&args.targets)?;

    for &target in &targets {
        let dir = if targets.len() == 1 {
            args.output.clone()
        } else {
            args.output.join(target.id())
        };
        if !args.dry_run && !args.force && is_non_empty_dir(&dir)? {
            bail!(
                "output directory {} is not empty (use --force to write anyway)",
                dir.display()
            );
        }

        let files = generate(&schema, target, &options)
            .with_context(|| format!("failed to generate {target}"))?;

        if args.dry_run {
            println!("{target}: {} files (dry run)", files.len());
        } else {
            files
                .write_to(&dir)
                .with_context(|| format!("failed to write {}", dir.display()))?;
            info!(%target, dir = %dir.display(), "wrote project");
            println!("Generated {} files for {target} to {}", files.len(), dir.display());
        }
        for file in &files.files {
            println!("  - {}", file.path.display());
        }
    }
    Ok(())
}

fn run_check(input: &Path) -> Result<()> {
    let schema = load_schema(input)?;
    println!("✓ {} parsed", input.display());
    println!("  {} tables", schema.tables.len());
    for table in &schema.tables {
        let key = if table.primary_key.is_empty() {
            "no primary key".to_string()
        } else {
            format!("primary key ({})", table.primary_key.join(", "))
        };
        let kind = if table.is_join_table() { ", join table" } else { "" };
        println!("    table {} ({} columns, {key}{kind})", table.name, table.columns.len());
        for column in &table.columns {
            let null = if column.nullable { "" } else { " NOT NULL" };
            println!("      {} {}{null}", column.name, column.sql_type);
        }
    }

    let relationships = schema.relationships();
    if !relationships.is_empty() {
        println!("  {} relationships", relationships.len());
        for rel in &relationships {
            println!(
                "    {}.{} -> {} ({})",
                rel.table,
                rel.property,
                rel.target_table,
                rel.kind.as_str()
            );
        }
    }

    let issues = validate(&schema);
    for issue in &issues {
        println!("  {issue}");
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .count();
    if errors > 0 {
        bail!("{errors} validation error(s) in {}", input.display());
    }
    Ok(())
}

fn run_fmt(input: &Path, write: bool) -> Result<()> {
    let schema = load_schema(input)?;
    let formatted = format_schema(&schema);

    if write {
        std::fs::write(input, &formatted)
            .with_context(|| format!("failed to write {}", input.display()))?;
        println!("Formatted {}", input.display());
    } else {
        print!("{formatted}");
    }
    Ok(())
}

fn run_list_targets() -> Result<()> {
    println!("Available targets:");
    println!();
    for target in Target::all() {
        println!("  {:<18} {}", target.id(), target.description());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "crudforge", "-v", "generate", "-i", "schema.sql", "-t", "go", "-t", "nest", "-o",
            "out", "--no-auth", "--set", "api_prefix=/v1", "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.targets, vec!["go", "nest"]);
        assert!(args.no_auth && args.dry_run && !args.force);
        assert_eq!(args.set, vec![("api_prefix".to_string(), "/v1".to_string())]);
    }

    #[test]
    fn test_generate_requires_a_target() {
        assert!(Cli::try_parse_from(["crudforge", "generate", "-i", "a.sql", "-o", "out"]).is_err());
    }

    #[test]
    fn test_resolve_targets() {
        let all = resolve_targets(&["all".to_string(), "rust".to_string()]).unwrap();
        assert_eq!(all.len(), Target::all().len());

        let some = resolve_targets(&["spring".to_string(), "java-spring".to_string()]).unwrap();
        assert_eq!(some, vec![Target::JavaSpring]);

        assert!(resolve_targets(&["cobol".to_string()]).is_err());
    }

    #[test]
    fn test_non_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_non_empty_dir(&dir.path().join("missing")).unwrap());
        assert!(!is_non_empty_dir(dir.path()).unwrap());
        std::fs::write(dir.path().join("file"), "x").unwrap();
        assert!(is_non_empty_dir(dir.path()).unwrap());
    }

    #[test]
    fn test_generate_writes_one_dir_per_target() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("schema.sql");
        std::fs::write(
            &input,
            "CREATE TABLE notes (id SERIAL PRIMARY KEY, body TEXT NOT NULL);",
        )
        .unwrap();
        let out = dir.path().join("out");
        let argv: Vec<OsString> = vec![
            "crudforge".into(),
            "generate".into(),
            "-i".into(),
            input.into_os_string(),
            "-t".into(),
            "go-gin".into(),
            "-t".into(),
            "python".into(),
            "-o".into(),
            out.clone().into_os_string(),
        ];
        let cli = Cli::try_parse_from(argv).unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        run_generate(args).unwrap();
        assert!(out.join("go-gin/go.mod").is_file());
        assert!(out.join("python-fastapi/app/main.py").is_file());
    }
}
