//! CLI error types and exit codes

use crossnode_core::{Classified, ErrorCategory};
use crossnode_protocol::{ConfigError, ProtocolError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Configuration error
/// - 3: Network error
/// - 4: Validation error
/// - 5: Trust error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Trust check failed: {0}")]
    Trust(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Network(_) => 3,
            CliError::Validation(_) => 4,
            CliError::Trust(_) => 5,
            CliError::Io(_) | CliError::Other(_) => 1,
        }
    }

    /// Print the error to stderr, with a hint when one applies
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => {
                Some("Run 'crossnode check-config --env-file <path>' against the deployment's environment file.")
            }
            CliError::Trust(_) => Some("Check the pinned SHA-256 digest against the published document."),
            CliError::Network(_) => Some("Check that the metadata URL is reachable from this host."),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<ProtocolError> for CliError {
    fn from(err: ProtocolError) -> Self {
        let message = err.to_string();
        match err.category() {
            ErrorCategory::Validation => CliError::Validation(message),
            ErrorCategory::Security => CliError::Trust(message),
            ErrorCategory::Configuration => CliError::Config(message),
            ErrorCategory::Internal => match err {
                ProtocolError::Unreachable { .. } => CliError::Network(message),
                _ => CliError::Other(message),
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Other(format!("failed to encode output: {err}"))
    }
}
