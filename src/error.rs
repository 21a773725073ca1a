//! Error types and handling infrastructure for answer-reveal.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types and `anyhow` for application-level error handling with context.
//!
//! Stale reveal steps are not errors: the controller absorbs them silently. The
//! variants below cover everything around the controller (configuration, transcripts,
//! terminal preview, service lifecycle).

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for answer-reveal operations.
#[derive(Error, Debug)]
pub enum RevealError {
    /// File system related errors (transcript or config could not be read)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Transcript file not found
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// A transcript line or wire payload could not be decoded
    #[error("Failed to decode event on line {line}: {message}")]
    DecodeError { line: usize, message: String },

    /// The render service task has stopped and can no longer accept commands
    #[error("Render service unavailable")]
    ServiceUnavailable,

    /// UI and terminal related errors
    #[error("UI operation failed: {message}")]
    UIError { message: String },

    /// Configuration file could not be parsed or contains invalid values
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid command line arguments
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Generic error for cases not covered by specific variants
    #[error("Operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for answer-reveal operations.
pub type Result<T> = std::result::Result<T, RevealError>;

impl RevealError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create a DecodeError for a 1-based transcript line
    pub fn decode(line: usize, message: impl Into<String>) -> Self {
        Self::DecodeError {
            line,
            message: message.into(),
        }
    }

    /// Create a UIError with a descriptive message
    pub fn ui(message: impl Into<String>) -> Self {
        Self::UIError {
            message: message.into(),
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create an InvalidArgument error with a descriptive message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a generic Other error with a descriptive message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for RevealError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}

impl From<serde_json::Error> for RevealError {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodeError {
            line: err.line(),
            message: err.to_string(),
        }
    }
}
