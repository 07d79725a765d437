//! dockaudit CLI entry point.

use clap::Parser;
use dockaudit::cli::{self, Cli, Commands, EXIT_ERROR};

fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    let result = match &cli.command {
        Commands::Audit(args) => cli::run_audit(args),
        Commands::Packs => cli::run_packs(),
        Commands::Facts(args) => cli::run_facts(args),
        Commands::Init(args) => cli::run_init(args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
