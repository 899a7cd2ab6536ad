//! Error types shared across the kernel.

use std::io;

use thiserror::Error;

/// Failures of the catalog cache store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("payload encoding: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store i/o: {0}")]
    Io(#[from] io::Error),

    #[error("store connection lock poisoned")]
    Poisoned,
}

/// Errors surfaced by resolution, enumeration and catalog access.
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// Network or parse failure while talking to a remote catalog.
    #[error("remote catalog: {0}")]
    Remote(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// An error row received over the polling protocol.
    #[error("{0}")]
    Operation(String),

    /// Cooperative cancellation. Never reported as a failure.
    #[error("operation canceled")]
    Canceled,
}

impl VfsError {
    pub fn remote(message: impl Into<String>) -> Self {
        VfsError::Remote(message.into())
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, VfsError::Canceled)
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
