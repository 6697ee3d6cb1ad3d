//! Stockroom CLI - drive the inventory and checkout core from the command line.
//!
//! Commands:
//! - `stockroom run` - Replay a scripted scenario against a fresh shop
//! - `stockroom stress` - Race concurrent checkouts against one variant
//! - `stockroom config` - Manage configuration

mod commands;
mod config;
mod context;
mod output;
mod scenario;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{ConfigArgs, RunArgs, StressArgs};

/// Stockroom CLI - Exercise inventory reservation and checkout
#[derive(Parser)]
#[command(name = "stockroom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (repeat for trace logging)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file
    Run(RunArgs),

    /// Run concurrent checkouts and verify nothing is oversold
    Stress(StressArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup output formatting
    let output = output::Output::new(cli.verbose > 0, cli.json);

    // Load config
    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    let mut logging = ctx.config.logging.clone();
    logging.level = logging.level.raised_by(cli.verbose);
    stockroom_observability::init_logging(&logging)?;

    // Execute command
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args, &ctx).await,
        Commands::Stress(args) => commands::stress::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
