use thiserror::Error;

use entiq_core::error::Error as CoreError;

/// Result type local to entiq-operators.
pub type Result<T> = std::result::Result<T, OpError>;

#[derive(Debug, Error)]
pub enum OpError {
    /// Zero or several catalog entries matched. The catalog is fixed at
    /// compile time, so this is a packaging defect rather than a user error.
    #[error("method '{name}' with generic arity {arity} and parameters '{shape}' resolved to {found} candidates (expected exactly 1)")]
    Resolution {
        name: String,
        arity: u8,
        shape: String,
        found: usize,
    },

    #[error("operator '{0}' is not supported for this element type")]
    Unsupported(String),

    #[error("operator {name} expects {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("cannot specialize {name}: {reason}")]
    Specialize { name: String, reason: String },

    #[error("rewrite of {name} failed: {reason}")]
    Rewrite { name: String, reason: String },

    #[error("canonical function {name}: {reason}")]
    Function { name: String, reason: String },

    #[error("query description error: {0}")]
    Dsl(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<serde_yaml::Error> for OpError {
    fn from(e: serde_yaml::Error) -> Self {
        OpError::Dsl(e.to_string())
    }
}
