use crate::directory::DirectoryError;
use contact_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Contact service is not initialized")]
    NotInitialized,

    #[error("Contact service is already initialized")]
    AlreadyInitialized,

    #[error("A backfill scan is already running")]
    ScanInProgress,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}
