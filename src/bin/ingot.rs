// src/bin/ingot.rs

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ingot::cli::{Cli, Commands};
use ingot::commands::compile::run_compile;
use ingot::commands::scan::run_scan;
use ingot::errors::DriverResult;

fn main() -> ExitCode {
    // Initialize tracing if INGOT_LOG is set.
    if let Ok(filter) = EnvFilter::try_from_env("INGOT_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    let result: DriverResult<()> = match &cli.command {
        Commands::Compile(args) => run_compile(args),
        Commands::Scan(args) => run_scan(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:?}", miette::Report::new(e));
            ExitCode::FAILURE
        }
    }
}
