//! Error types for the sync engine

use crate::client::transport::TransportError;
use crate::shared::config::ConfigError;
use crate::shared::error::SharedError;
use thiserror::Error;

/// Sync engine errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local cache failure
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shared(#[from] SharedError),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// The transport failure behind this error, if any
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            SyncError::Transport(error) => Some(error),
            _ => None,
        }
    }
}

/// Result alias used throughout the client
pub type Result<T> = std::result::Result<T, SyncError>;
