//! Error types for the Coffer engine.

use coffer_format::FormatError;
use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Coffer engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Key derivation failed: bad parameters or resource exhaustion.
    #[error("key derivation failed: {message}")]
    KeyDerivation {
        /// Description of the failure. Never contains key material.
        message: String,
    },

    /// A long-running operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Integrity verification failed: wrong key, or a tampered or
    /// corrupted container. The two cases are indistinguishable by design.
    #[error("integrity check failed: {message}")]
    Integrity {
        /// Description of what failed to verify.
        message: String,
    },

    /// The container declares a version or algorithm this build does not
    /// support.
    #[error("unsupported container: {found}, this build supports {supported}")]
    UnsupportedVersion {
        /// What the container declared.
        found: String,
        /// What this build supports.
        supported: String,
    },

    /// I/O error (read, write, or rename failure).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A tree mutation would break the single-parent, acyclic invariant.
    #[error("invalid move: {message}")]
    InvalidMove {
        /// Why the move was rejected.
        message: String,
    },

    /// No entry exists at the given path or id.
    #[error("entry not found: {path}")]
    EntryNotFound {
        /// The path or id that failed to resolve.
        path: String,
    },

    /// No group exists at the given path or id.
    #[error("group not found: {path}")]
    GroupNotFound {
        /// The path or id that failed to resolve.
        path: String,
    },

    /// A composite key was used before any factor was added.
    #[error("no key factors provided")]
    NoKeyFactors,

    /// The operation requires an unlocked database.
    #[error("database is locked")]
    DatabaseLocked,

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a key derivation error.
    pub fn key_derivation(message: impl Into<String>) -> Self {
        Self::KeyDerivation {
            message: message.into(),
        }
    }

    /// Creates an integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Creates an invalid-move error.
    pub fn invalid_move(message: impl Into<String>) -> Self {
        Self::InvalidMove {
            message: message.into(),
        }
    }

    /// Creates an entry-not-found error.
    pub fn entry_not_found(path: impl Into<String>) -> Self {
        Self::EntryNotFound { path: path.into() }
    }

    /// Creates a group-not-found error.
    pub fn group_not_found(path: impl Into<String>) -> Self {
        Self::GroupNotFound { path: path.into() }
    }

    /// Creates an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

impl From<FormatError> for CoreError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Integrity { message } => Self::Integrity { message },
            FormatError::UnsupportedVersion { found, supported } => {
                Self::UnsupportedVersion { found, supported }
            }
            FormatError::Io(e) => Self::Io(e),
        }
    }
}
