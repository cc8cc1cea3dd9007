//! Flightdeck CLI - A multi-pass build orchestrator for server components

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flightdeck::errors::BuildError;
use flightdeck::util::diagnostic;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    // Parse CLI
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        match e.downcast_ref::<BuildError>() {
            Some(err) => {
                let color = cli.shell(false).use_color();
                diagnostic::emit(&err.to_diagnostic(), color);
            }
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("flightdeck=debug")
    } else {
        EnvFilter::new("flightdeck=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(cli.shell(false).use_color())
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match &cli.command {
        Commands::Build(args) => commands::build::execute(cli, args),
        Commands::Manifest(args) => commands::manifest::execute(cli, args),
        Commands::Clean(args) => commands::clean::execute(cli, args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
