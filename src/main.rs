//! # todg3 exporter CLI
//!
//! A command-line front end for the todg3 exporter.
//!
//! ## Usage
//!
//! ```bash
//! # Generate a synthetic observation and export it
//! todg3 demo exported/ --samples 100000 --detectors 8 --use-chunks
//!
//! # Inspect an output file
//! todg3 info exported/obs_demo/so_00000000.g3
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

/// todg3 - Distributed TOD to frame-file exporter
#[derive(Parser)]
#[command(name = "todg3")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// TOML configuration file with export defaults
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic observation and export it to frame files
    Demo(cli::demo::DemoArgs),

    /// Display information about a frame file
    Info(cli::info::InfoArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let file_config = match &cli.config {
        Some(path) => Some(cli::config::Config::from_file(path)?),
        None => None,
    };

    match cli.command {
        Commands::Demo(args) => cli::demo::run(&args, file_config.as_ref()),
        Commands::Info(args) => cli::info::run(&args),
    }
}
