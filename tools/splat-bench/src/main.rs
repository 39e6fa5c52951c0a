//! Splat Bench - drive the Splatstorm pipeline from the command line
//!
//! # Commands
//!
//! - `splat-bench run` - render frames of a synthetic scene against a
//!   simulated coprocessor and report perf/sort/math statistics
//! - `splat-bench sort` - time every sort algorithm and verify the order
//! - `splat-bench luts` - generate lookup tables and print sample values
//! - `splat-bench config` - print or write the pipeline config
//!
//! # Usage
//!
//! ```bash
//! # 10k splats at high quality for 120 frames
//! splat-bench run --splats 10000 --quality high
//!
//! # Orbiting camera, fixed-point transforms, JSON output
//! splat-bench run --orbit --fixed --json
//! ```

mod config;
mod luts;
mod run;
mod scene;
mod sim;
mod sort;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Splat Bench - benchmark and inspection tool for the splat pipeline
#[derive(Parser)]
#[command(name = "splat-bench")]
#[command(about = "Benchmark and inspection tool for the Splatstorm pipeline")]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a synthetic scene through a simulated coprocessor
    Run(run::RunArgs),

    /// Time the depth sort algorithms
    Sort(sort::SortArgs),

    /// Generate lookup tables and print a summary
    Luts(luts::LutsArgs),

    /// Print or write the pipeline configuration
    Config(config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run(args) => run::execute(args),
        Commands::Sort(args) => sort::execute(args),
        Commands::Luts(args) => luts::execute(args),
        Commands::Config(args) => config::execute(args),
    }
}
