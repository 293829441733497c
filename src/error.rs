//! Error taxonomy for the library core.
//!
//! Every failure maps onto one of four kinds that the transport layer
//! translates into a structured response:
//! - `NotFound`: missing entry, tag, page or progress row
//! - `InvalidArgument`: unknown sort/filter/order value, malformed input
//! - `Io`: container open/read, image codec, cache write
//! - `Upstream`: persistence collaborator or background worker failure

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Coarse classification used by transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Io,
    Upstream,
}

/// Errors produced by the library core
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("Page {index} not found in {entry}")]
    PageNotFound { entry: String, index: usize },

    #[error("Container not found: {0}")]
    ContainerNotFound(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Stream closed by receiver")]
    StreamClosed,

    #[error("Maintenance worker is not running")]
    WorkerStopped,
}

impl LibraryError {
    /// Shorthand for an `InvalidArgument` error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Classify this error for the transport layer
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EntryNotFound(_)
            | Self::TagNotFound(_)
            | Self::PageNotFound { .. }
            | Self::ContainerNotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Io(_) | Self::Archive(_) | Self::Image(_) | Self::StreamClosed => ErrorKind::Io,
            Self::Storage(_) | Self::Serialization(_) | Self::Join(_) | Self::WorkerStopped => {
                ErrorKind::Upstream
            }
        }
    }

    /// Whether this error means the requested resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
