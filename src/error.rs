//! Centralized error types for mailshrink.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailshrink library.
#[derive(Error, Debug)]
pub enum ShrinkError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The bytes could not be parsed as an RFC 5322 message.
    #[error("Not a valid message: {0}")]
    InvalidMessage(String),

    /// A leaf payload is not a recognizable raster image.
    #[error("Image decode error: {0}")]
    Decode(String),

    /// Reorientation, resizing or encoding failed.
    #[error("Image codec error: {0}")]
    Codec(String),

    /// The document tree is not self-consistent.
    #[error("Malformed document tree: {0}")]
    Structural(String),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, ShrinkError>`.
pub type Result<T> = std::result::Result<T, ShrinkError>;

impl ShrinkError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for per-image failures that leave the surrounding document intact.
    ///
    /// The rewriter keeps the original leaf when one of these is raised.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Codec(_))
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare — prefer `ShrinkError::io`).
impl From<std::io::Error> for ShrinkError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
