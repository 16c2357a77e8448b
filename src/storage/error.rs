//! Error kinds shared by every [`crate::storage::StorageAdapter`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("write error: {0}")]
    WriteError(String),
    #[error("storage error: {0}")]
    Other(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
