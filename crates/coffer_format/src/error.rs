//! Error types for the container format.

use std::io;
use thiserror::Error;

/// Result type for format operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors that can occur while reading or writing a container.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The container failed integrity verification.
    ///
    /// Covers both a wrong key and a tampered or corrupted body; the two
    /// are deliberately indistinguishable so the error cannot be used as
    /// a password-correctness oracle.
    #[error("integrity check failed: {message}")]
    Integrity {
        /// Description of what failed to verify.
        message: String,
    },

    /// The container declares a version or algorithm this build does not
    /// support. Unknown values always fail closed.
    #[error("unsupported container: {found}, this build supports {supported}")]
    UnsupportedVersion {
        /// What the container declared.
        found: String,
        /// What this build supports.
        supported: String,
    },

    /// I/O error, including a truncated container.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FormatError {
    /// Creates an integrity failure.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Creates an unsupported-version failure.
    pub fn unsupported(found: impl Into<String>, supported: impl Into<String>) -> Self {
        Self::UnsupportedVersion {
            found: found.into(),
            supported: supported.into(),
        }
    }

    /// Creates a truncation error (`UnexpectedEof`).
    pub fn truncated(context: &str) -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("container truncated: {context}"),
        ))
    }
}
