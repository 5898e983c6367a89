use thiserror::Error;

/// Errors raised by document store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write would violate a unique index.
    #[error("duplicate key in collection '{collection}': {key}")]
    DuplicateKey { collection: String, key: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The filter uses an operator the backend cannot evaluate.
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
