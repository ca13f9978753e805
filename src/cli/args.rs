// src/cli/args.rs

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// How much edge provenance the graph keeps for diagnostics.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum TrackingMode {
    /// Keep nothing beyond the marked set
    None,
    /// Keep one inbound edge per node
    #[default]
    First,
    /// Keep every inbound edge
    All,
}

/// Ahead-of-time native image compiler for managed modules
#[derive(Parser)]
#[command(name = "ingot")]
#[command(version)]
#[command(about = "AOT native image compiler driver", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug)]
pub struct CompileArgs {
    /// Primary module description (JSON)
    #[arg(value_name = "MODULE")]
    pub input: PathBuf,

    /// Reference module descriptions forming the version bubble
    #[arg(short = 'r', long = "reference", value_name = "MODULE")]
    pub references: Vec<PathBuf>,

    /// Output image path
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Root every reachable method instead of just the entry point
    #[arg(long)]
    pub library: bool,

    /// Compile a single method, given as Namespace.Type::Method
    #[arg(long, value_name = "METHOD", conflicts_with = "library")]
    pub single_method: Option<String>,

    /// Root canonical instantiations of generics (ROOT_CANONICAL_CODE)
    #[arg(long)]
    pub root_canonical_code: bool,

    /// Emit empty bodies for all generic methods (NO_GENERIC_CODE)
    #[arg(long)]
    pub no_generic_code: bool,

    /// Emit empty bodies for non-canonical instantiations (ONLY_CANONICAL_CODE)
    #[arg(long)]
    pub only_canonical_code: bool,

    /// Log every method as compilation begins
    #[arg(short, long)]
    pub verbose: bool,

    /// Edge provenance retention
    #[arg(long, value_enum, default_value_t = TrackingMode::First)]
    pub track: TrackingMode,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a module into a native image
    #[command(visible_alias = "c")]
    Compile(CompileArgs),

    /// Run only the scanner and print what it discovered
    #[command(visible_alias = "s")]
    Scan(CompileArgs),
}
