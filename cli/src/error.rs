//! Unified error handling for the CLI.

use crate::config::ConfigError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Engine error: {0}")]
    Engine(#[from] carrier_engine::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid JSON for {what}: {reason}")]
    InvalidJson { what: &'static str, reason: String },

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, CliError>;
