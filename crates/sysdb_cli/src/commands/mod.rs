//! CLI command implementations.

pub mod admin_token;
pub mod inspect;
pub mod purge;
pub mod serve;

use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The command needs `--path`.
    #[error("database path required for {0}")]
    MissingPath(&'static str),

    /// Coordinator error.
    #[error(transparent)]
    Core(#[from] sysdb_core::CoreError),

    /// Server error.
    #[error(transparent)]
    Server(#[from] sysdb_server::ServerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
