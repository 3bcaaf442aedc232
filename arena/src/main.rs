//! # Arena
//!
//! Command-line runner for the Ant velocity-tracking environments.
//!
//! -   `arena run` drives the single-instance environment, optionally with a
//!     live viewer, and logs every finished episode.
//! -   `arena batch` drives the batched environment with random actions and
//!     reports throughput.
//! -   `arena describe` prints the model dimensions and spaces.

mod app;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arena", version, about = "Legged velocity-tracking environments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run episodes on the CPU environment
    Run(RunArgs),
    /// Step the batched environment and report throughput
    Batch(BatchArgs),
    /// Describe the model and its spaces
    Describe {
        /// Scene description (JSON); the built-in Ant when omitted
        #[arg(long)]
        scene: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Scene description (JSON); the built-in Ant when omitted
    #[arg(long)]
    scene: Option<PathBuf>,
    /// Environment config (JSON); defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 3)]
    episodes: u32,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, value_enum, default_value_t = Policy::Random)]
    policy: Policy,
    /// Open a window and draw every step
    #[arg(long)]
    render: bool,
}

#[derive(clap::Args)]
struct BatchArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 64)]
    batch_size: usize,
    #[arg(long, default_value_t = 1000)]
    steps: u32,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, value_enum, default_value_t = Backend::Auto)]
    backend: Backend,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Policy {
    Zero,
    Random,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Cpu,
    Gpu,
    Auto,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    match Cli::parse().command {
        Commands::Run(args) => app::run(&args),
        Commands::Batch(args) => app::batch(&args),
        Commands::Describe { scene } => app::describe(scene.as_deref()),
    }
}
