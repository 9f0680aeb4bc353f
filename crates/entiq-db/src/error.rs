use thiserror::Error;

use entiq_core::error::Error as CoreError;

/// Result type local to entiq-db.
pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// The store's recorded model differs from the context's model. The
    /// store is left untouched.
    #[error("the model backing the '{context}' context has changed since the database was created")]
    ModelMismatch { context: String },

    #[error("database '{database}' cannot be created because it already exists")]
    AlreadyExists { database: String },

    #[error("model compatibility cannot be checked because database '{database}' does not contain model metadata")]
    NoMetadata { database: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("seed error: {0}")]
    Seed(String),

    #[error("the command timeout must be a non-negative number of seconds, got {0}")]
    InvalidCommandTimeout(i64),

    #[error(transparent)]
    Core(#[from] CoreError),
}
