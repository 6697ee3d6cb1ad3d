//! CLI command implementations.

pub mod config;
pub mod run;
pub mod stress;

use clap::{Args, Subcommand};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Scenario file (TOML or JSON).
    pub scenario: String,

    /// Stop at the first step whose outcome differs from its expectation.
    #[arg(long)]
    pub fail_fast: bool,
}

/// Arguments for the stress command.
#[derive(Args)]
pub struct StressArgs {
    /// Opening stock of the contested variant.
    #[arg(long, default_value = "100")]
    pub stock: u32,

    /// Number of concurrent shoppers.
    #[arg(short, long, default_value = "8")]
    pub workers: usize,

    /// Checkout attempts per shopper.
    #[arg(short, long, default_value = "50")]
    pub attempts: usize,

    /// Units per checkout.
    #[arg(short, long, default_value = "1")]
    pub quantity: u32,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Get a config value by dotted key.
    Get {
        /// Key, e.g. `commerce.lock.retry_budget`.
        key: String,
    },
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}
