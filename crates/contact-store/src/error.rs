use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Snapshot write to {path} timed out after {timeout_ms} ms")]
    PersistenceTimeout { path: PathBuf, timeout_ms: u64 },

    #[error("Snapshot writer is closed")]
    WriterClosed,

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
