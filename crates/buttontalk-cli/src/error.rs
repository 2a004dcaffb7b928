//! CLI-specific error types and exit codes.

use buttontalk_core::SettingsError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Settings file or environment is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] SettingsError),

    /// The language-model provider could not be constructed.
    #[error("Provider error: {0:#}")]
    Provider(anyhow::Error),

    /// Reading input or writing output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map error to an exit code (see sysexits.h).
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 78,   // EX_CONFIG
            Self::Provider(_) => 69, // EX_UNAVAILABLE
            Self::Io(_) => 74,       // EX_IOERR
        }
    }
}
