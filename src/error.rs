//! Error types for stashdb

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stashdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stashdb operations
#[derive(Error, Debug)]
pub enum Error {
    /// The blob store could not be opened or created at its location
    #[error("Backend unavailable at {}: {source}", .location.display())]
    BackendUnavailable {
        location: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend failed (not merely "absent") while fetching an asset
    #[error("Failed to read asset '{asset}': {source}")]
    BlobRead {
        asset: String,
        #[source]
        source: Box<Error>,
    },

    /// A stored asset does not decode as the expected snapshot
    #[error("Failed to decode asset '{asset}': {source}")]
    Decode {
        asset: String,
        #[source]
        source: Box<Error>,
    },

    /// Encoding or writing a snapshot failed; memory is ahead of disk
    #[error("Failed to persist asset '{asset}': {source}")]
    Persist {
        asset: String,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Layout mismatch: expected {expected}, found {found}")]
    LayoutMismatch { expected: String, found: String },

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures that leave the in-memory stash ahead of its asset
    pub fn is_persist(&self) -> bool {
        matches!(self, Error::Persist { .. })
    }
}
