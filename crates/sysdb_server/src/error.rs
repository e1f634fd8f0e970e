//! Error types for the coordinator server.

use serde::{Deserialize, Serialize};
use std::fmt;
use sysdb_core::{CoreError, ErrorCode};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Wire status of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// Entity absent or deleted.
    NotFound,
    /// Entity already exists.
    AlreadyExists,
    /// Stale version; re-read and retry.
    Aborted,
    /// Malformed request or argument.
    InvalidArgument,
    /// Operation not available to this caller.
    Unimplemented,
    /// Storage unavailable; retry later.
    Unavailable,
    /// Request took longer than the configured timeout.
    DeadlineExceeded,
    /// Connection limit reached.
    ResourceExhausted,
    /// Unexpected server fault.
    Internal,
}

impl StatusCode {
    /// Returns the wire spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Aborted => "ABORTED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Unavailable => "UNAVAILABLE",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorCode> for StatusCode {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NotFound => Self::NotFound,
            ErrorCode::AlreadyExists => Self::AlreadyExists,
            ErrorCode::VersionConflict => Self::Aborted,
            ErrorCode::InvalidArgument => Self::InvalidArgument,
            ErrorCode::Unimplemented => Self::Unimplemented,
            ErrorCode::Unavailable => Self::Unavailable,
            ErrorCode::Internal => Self::Internal,
        }
    }
}

/// Errors that can occur in the coordinator server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Request could not be decoded or failed shape validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No handler is registered for the method.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Admin token was missing or rejected.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Coordinator error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Request exceeded the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Too many open connections.
    #[error("connection limit of {0} reached")]
    Overloaded(usize),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns the wire status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::InvalidArgument,
            Self::UnknownMethod(_) | Self::NotAuthorized(_) => StatusCode::Unimplemented,
            Self::Core(e) => e.code().into(),
            Self::Timeout(_) => StatusCode::DeadlineExceeded,
            Self::Overloaded(_) => StatusCode::ResourceExhausted,
            Self::Internal(_) | Self::Io(_) => StatusCode::Internal,
        }
    }

    /// Returns true if the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.status(),
            StatusCode::NotFound
                | StatusCode::AlreadyExists
                | StatusCode::Aborted
                | StatusCode::InvalidArgument
                | StatusCode::Unimplemented
        )
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}
