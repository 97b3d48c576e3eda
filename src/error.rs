//! Unified error handling for gguf-atlas
//!
//! This module provides the crate-wide error type. Loader-level format errors
//! live in [`crate::loader::gguf::GgufError`] and convert into [`AtlasError`]
//! through `#[from]`. Errors are categorized for handling decisions:
//! - User errors (bad configuration or arguments)
//! - Recoverable errors (superseded work that the caller may retry)
//! - Model errors (malformed, truncated or unreadable model files)
//! - Internal errors (bugs, thread-pool and task failures)

use std::fmt;

use crate::loader::gguf::GgufError;

// Re-export thiserror for convenience
pub use thiserror;

/// Unified error type for gguf-atlas
#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    // ========== Model/Loader Errors ==========
    /// Malformed or truncated GGUF file
    #[error("GGUF format error: {0}")]
    Format(#[from] GgufError),

    /// A byte range outside the backing file was requested
    #[error("Read out of bounds: offset={offset}, len={len}, file size={file_len}")]
    ReadOutOfBounds { offset: u64, len: usize, file_len: u64 },

    /// Sampling a single tensor failed
    #[error("Sampling failed for tensor '{tensor}': {reason}")]
    SamplingFailed { tensor: String, reason: String },

    // ========== Pipeline Errors ==========
    /// A newer generation request replaced this one
    #[error("Generation {ticket} superseded by {latest}")]
    Superseded { ticket: u64, latest: u64 },

    /// Invalid pipeline configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ========== I/O Errors ==========
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapError(String),

    // ========== Internal Errors ==========
    /// Internal error (indicates a bug)
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AtlasError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            AtlasError::InvalidConfiguration(_) => ErrorCategory::User,

            AtlasError::Superseded { .. } => ErrorCategory::Recoverable,

            AtlasError::Format(_)
            | AtlasError::ReadOutOfBounds { .. }
            | AtlasError::SamplingFailed { .. }
            | AtlasError::IoError(_)
            | AtlasError::MmapError(_) => ErrorCategory::Model,

            AtlasError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Check if the caller may retry the operation
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Recoverable)
    }

    /// Check if this is a user-facing error (actionable by users)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if the model file itself is at fault
    pub fn is_model_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Model)
    }
}

/// Error category for handling decisions
///
/// - User: show to user, ask them to fix input
/// - Recoverable: retry or ignore (stale work)
/// - Model: the file is malformed, truncated or unreadable
/// - Internal: log and report as bug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    User,
    Recoverable,
    Model,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Recoverable => write!(f, "Recoverable"),
            ErrorCategory::Model => write!(f, "Model"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

/// Helper type alias for Results using AtlasError
pub type AtlasResult<T> = std::result::Result<T, AtlasError>;

/// Create a configuration error with context
///
/// # Examples
/// ```ignore
/// return Err(config_error!("fan_out must be > 0, got {}", n));
/// ```
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::AtlasError::InvalidConfiguration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::AtlasError::InvalidConfiguration(format!($fmt, $($arg)*))
    };
}

/// Create an internal error with context
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::AtlasError::InternalError($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::AtlasError::InternalError(format!($fmt, $($arg)*))
    };
}

/// Wrap an IO error with context
///
/// # Examples
/// ```ignore
/// let file = File::open(path).map_err(|e| io_context(e, "opening model"))?;
/// ```
pub fn io_context(err: std::io::Error, msg: &str) -> AtlasError {
    AtlasError::IoError(std::io::Error::new(err.kind(), format!("{}: {}", msg, err)))
}
