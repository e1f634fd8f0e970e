//! Error types for SysDB core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Caller-visible classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Referenced entity is absent or tombstoned.
    NotFound,
    /// Uniqueness violation on create.
    AlreadyExists,
    /// Compare-and-swap mismatch; re-read and retry.
    VersionConflict,
    /// Malformed or non-monotonic input.
    InvalidArgument,
    /// Administrative operation invoked without capability, or disabled.
    Unimplemented,
    /// Storage stayed unavailable after bounded retries.
    Unavailable,
    /// Non-transient storage or encoding fault.
    Internal,
}

/// Errors that can occur in SysDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error that is not transient.
    #[error("storage error: {0}")]
    Storage(#[from] sysdb_storage::StorageError),

    /// A stored record could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// Entity absent or tombstoned.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind.
        kind: &'static str,
        /// Identifier or name that was looked up.
        id: String,
    },

    /// Entity with the same identity already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Entity kind.
        kind: &'static str,
        /// Conflicting identifier or name.
        id: String,
    },

    /// Expected version did not match the stored version.
    #[error("version conflict on {kind} {id}: expected v{expected}, found v{actual}")]
    VersionConflict {
        /// Entity kind.
        kind: &'static str,
        /// Entity identifier.
        id: String,
        /// Version the caller expected.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// Request argument is invalid.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Operation is not available to this caller.
    #[error("unimplemented: {message}")]
    Unimplemented {
        /// Why the operation was refused.
        message: String,
    },

    /// Storage was unavailable after bounded retries.
    #[error("unavailable: {message}")]
    Unavailable {
        /// Description of the last failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Creates an already exists error.
    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an unimplemented error.
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::Unimplemented {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Returns the caller-visible classification.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::VersionConflict { .. } => ErrorCode::VersionConflict,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::Unimplemented { .. } => ErrorCode::Unimplemented,
            Self::Unavailable { .. } => ErrorCode::Unavailable,
            Self::Storage(_) | Self::Codec { .. } => ErrorCode::Internal,
        }
    }

    /// Rewrites an [`AlreadyExists`](Self::AlreadyExists) to name the user-facing entity.
    pub(crate) fn rename_conflict(self, kind: &'static str, id: &str) -> Self {
        match self {
            Self::AlreadyExists { .. } => Self::already_exists(kind, id),
            other => other,
        }
    }
}
