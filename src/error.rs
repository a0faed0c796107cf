//! Error types for the tourdb store layer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The host environment cannot provide persistent storage
    /// (data directory missing and not creatable, or not writable).
    #[error("persistent storage unavailable: {0}")]
    StoreUnavailable(String),

    /// The open sequence errored, was refused, or was abandoned.
    #[error("store initialization failed: {0}")]
    InitializationFailed(String),

    /// The schema registry and the live structure disagree.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// `create` with a primary key that already exists, or a write that
    /// violates a unique secondary index.
    #[error("duplicate key '{key}' in table '{table}'")]
    DuplicateKey { table: String, key: String },

    /// `update` target missing.
    #[error("record '{key}' not found in table '{table}'")]
    NotFound { table: String, key: String },

    /// Lookup against a secondary index the schema does not declare.
    #[error("index '{index}' not declared on table '{table}'")]
    IndexNotFound { table: String, index: String },

    /// An underlying transaction aborted, or a structural upgrade failed.
    #[error("transaction failure: {0}")]
    TransactionFailure(String),

    /// Side-channel version marker could not be read or written.
    /// Always caught and logged internally; never blocks initialization.
    #[error("version check failed: {0}")]
    VersionCheck(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A persisted table file failed its integrity check.
    #[error("data corruption: {0}")]
    Corruption(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
