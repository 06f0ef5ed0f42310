//! Storage error types.

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Store not found.
    #[error("store not found: {store_id}")]
    StoreNotFound { store_id: String },

    /// Store id already taken, or an optimistic check-and-set lost the race.
    #[error("store already exists: {store_id}")]
    StoreAlreadyExists { store_id: String },

    /// Authorization model not found.
    #[error("authorization model not found: {model_id}")]
    ModelNotFound { model_id: String },

    /// Tuple not found.
    #[error("tuple not found: {object}#{relation}@{user}")]
    TupleNotFound {
        object: String,
        relation: String,
        user: String,
    },

    /// Continuation token decodes neither as a cursor nor as a legacy offset.
    #[error("invalid continuation token: {token}")]
    InvalidContinuationToken { token: String },

    /// Connection-level failure talking to the key/value server.
    #[error("connection error: {message}")]
    ConnectionError { message: String },

    /// Command-level failure from the key/value server.
    #[error("query error: {message}")]
    QueryError { message: String },

    /// A pipelined transaction failed to commit.
    #[error("transaction error: {message}")]
    TransactionError { message: String },

    /// Encoding or decoding a persisted record failed.
    #[error("serialization error: {message}")]
    SerializationError { message: String },

    /// Filter shape not servable by any index.
    #[error("invalid filter: {message}")]
    InvalidFilter { message: String },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_io_error() {
            StorageError::ConnectionError {
                message: err.to_string(),
            }
        } else {
            StorageError::QueryError {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError {
            message: err.to_string(),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
