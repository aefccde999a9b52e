// docstore-core/src/error.rs
// Error taxonomy shared by every module

use thiserror::Error;

/// Errors raised by the document store
///
/// Usage errors (malformed queries, updates, projections, documents and
/// pipelines) are raised before any mutation happens. Backend errors come
/// from the `Storage` implementation and are passed through unchanged.
#[derive(Error, Debug)]
pub enum DocStoreError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Aggregation error: {0}")]
    AggregationError(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocStoreError {
    /// True for errors caused by the caller's input rather than the backend
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            DocStoreError::InvalidQuery(_)
                | DocStoreError::InvalidUpdate(_)
                | DocStoreError::InvalidProjection(_)
                | DocStoreError::InvalidDocument(_)
                | DocStoreError::AggregationError(_)
        )
    }
}

impl From<serde_json::Error> for DocStoreError {
    fn from(err: serde_json::Error) -> Self {
        DocStoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DocStoreError>;
