use folio_db::StoreError;
use thiserror::Error;

use crate::schema::ValidationErrors;

/// Errors produced by model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// A unique index rejected the write.
    #[error("duplicate field value: {0}")]
    Duplicate(String),

    /// The caller supplied a filter or sort the schema cannot express.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("unknown virtual field '{0}'")]
    UnknownVirtual(String),

    #[error("hook failed: {0}")]
    Hook(String),

    /// A stored document no longer matches the model type.
    #[error("failed to decode document: {0}")]
    Decode(String),

    #[error(transparent)]
    Store(StoreError),
}

pub type ModelResult<T> = Result<T, ModelError>;

impl From<StoreError> for ModelError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { key, .. } => ModelError::Duplicate(key),
            other => ModelError::Store(other),
        }
    }
}
