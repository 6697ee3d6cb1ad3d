//! Logging setup for Stockroom.
//!
//! This crate provides:
//! - `LoggingConfig` - level and output format, loadable from config files
//! - `init_logging` - installs the global `tracing` subscriber

mod logging;

pub use logging::*;

use thiserror::Error;

/// Errors raised while initialising observability.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    /// Failed to initialise tracing subscriber.
    #[error("failed to initialise tracing subscriber: {0}")]
    TracingSubscriber(#[from] tracing_subscriber::util::TryInitError),

    /// The filter directive could not be parsed.
    #[error("invalid log filter {directive:?}: {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
}
