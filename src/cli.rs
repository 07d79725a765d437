//! Command-line interface for dockaudit.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::dockerfile::{load_build_files, BuildFileTarget, FactSheet};
use crate::report;
use crate::rules::{registry, Severity};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

const FORMATS: &[&str] = &["pretty", "json", "sarif", "lines"];

const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

/// Static security and hygiene audit for Dockerfiles.
///
/// dockaudit parses every Dockerfile under a path and runs heuristic rule
/// packs over it: root users, floating base images, unpinned packages,
/// piped installers, embedded secrets and more. Nothing is built, pulled
/// or executed.
#[derive(Parser)]
#[command(name = "dockaudit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Audit Dockerfiles under a path
    #[command(visible_alias = "scan")]
    Audit(AuditArgs),
    /// List the available rule packs
    Packs,
    /// Print the facts extracted from each Dockerfile as JSON
    Facts(FactsArgs),
    /// Create a dockaudit.yaml config from the default template
    Init(InitArgs),
}

/// Arguments for the audit command.
#[derive(Parser)]
pub struct AuditArgs {
    /// Path to audit (Dockerfile or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty, json, sarif, or lines
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Rule pack to run (repeatable; default: all, or the config's list)
    #[arg(short, long = "pack")]
    pub packs: Vec<String>,

    /// Lowest severity that fails the audit: info, warning, or error
    #[arg(long)]
    pub fail_on: Option<Severity>,

    /// Worker threads (0 = one per core)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Show suppressed findings in pretty output
    #[arg(long)]
    pub show_suppressed: bool,
}

/// Arguments for the facts command.
#[derive(Parser)]
pub struct FactsArgs {
    /// Path to inspect (Dockerfile or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "dockaudit.yaml")]
    pub output: PathBuf,
}

impl Cli {
    /// Initialize logging based on verbosity flags.
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}

/// Load the config named on the command line, or discover one.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<(Config, Option<PathBuf>)> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    let loaded = Config::load(explicit, &cwd)?;
    Ok(loaded)
}

/// Run the audit command.
pub fn run_audit(args: &AuditArgs) -> anyhow::Result<i32> {
    if !FORMATS.contains(&args.format.as_str()) {
        eprintln!(
            "Error: invalid format {:?}, must be one of {}",
            args.format,
            FORMATS.join(", ")
        );
        return Ok(EXIT_ERROR);
    }

    let (mut config, config_path) = match load_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };
    if let Some(jobs) = args.jobs {
        config.jobs = Some(jobs);
    }

    let target = match BuildFileTarget::resolve(&args.path) {
        Some(t) => t,
        None => {
            eprintln!("Error: cannot access path {:?}", args.path);
            return Ok(EXIT_ERROR);
        }
    };

    let runner = match config.runner(&args.packs) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let result = runner.run(&target);
    if result.scanned == 0 {
        eprintln!("Warning: no Dockerfiles found under {}", args.path.display());
        return Ok(EXIT_SUCCESS);
    }

    let fail_on = args.fail_on.unwrap_or_else(|| config.fail_on());
    let path_str = args.path.to_string_lossy().to_string();

    match args.format.as_str() {
        "json" => report::write_json(&path_str, config_path.as_deref(), &result, fail_on)?,
        "sarif" => report::write_sarif(&result)?,
        "lines" => report::write_lines(&result),
        _ => report::write_pretty(
            &path_str,
            config_path.as_deref(),
            &result,
            fail_on,
            args.show_suppressed,
        ),
    }

    if result.has_at_least(fail_on) {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the packs command.
pub fn run_packs() -> anyhow::Result<i32> {
    println!("Available rule packs:");
    println!();
    for pack in registry() {
        println!("  {:<12} {}", pack.name(), pack.description());
    }
    println!();
    println!("Usage:");
    println!("  dockaudit audit <path> --pack <name> [--pack <name>...]");
    Ok(EXIT_SUCCESS)
}

/// Run the facts command.
pub fn run_facts(args: &FactsArgs) -> anyhow::Result<i32> {
    let (config, _) = match load_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let target = match BuildFileTarget::resolve(&args.path) {
        Some(t) => t,
        None => {
            eprintln!("Error: cannot access path {:?}", args.path);
            return Ok(EXIT_ERROR);
        }
    };

    let models = load_build_files(&target, &config.load_options()?);
    if models.is_empty() {
        eprintln!("Warning: no Dockerfiles found under {}", args.path.display());
        return Ok(EXIT_SUCCESS);
    }

    let sheets: Vec<FactSheet> = models.iter().map(FactSheet::collect).collect();
    let json = serde_json::to_string_pretty(&sheets)?;
    println!("{}", json);
    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // Check if output already exists
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    std::fs::write(&args.output, DEFAULT_TEMPLATE)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    println!("  2. Run: dockaudit audit . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}
