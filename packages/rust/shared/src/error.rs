//! Error types for Jobflow.
//!
//! Library crates use [`JobflowError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Jobflow operations.
#[derive(Debug, thiserror::Error)]
pub enum JobflowError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to a job board.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed payload returned by a job board.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Request validation error (rejected before a workflow run is created).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A source adapter could not produce a batch for its platform.
    #[error("adapter error ({platform}): {message}")]
    Adapter { platform: String, message: String },

    /// Workflow bookkeeping error outside any per-platform step.
    #[error("workflow error: {0}")]
    Workflow(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, JobflowError>;

impl JobflowError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an adapter error for `platform`.
    pub fn adapter(platform: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Adapter {
            platform: platform.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
