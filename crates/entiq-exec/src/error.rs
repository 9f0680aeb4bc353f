use thiserror::Error;

use entiq_core::error::Error as CoreError;
use entiq_core::types::TypeRef;
use entiq_operators::OpError;

/// Result type local to entiq-exec.
pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    /// The sequence's provider has no async execution capability. Raised
    /// before any future exists; there is no synchronous fallback.
    #[error("the provider '{provider}' for source of type Queryable<{element}> does not support asynchronous operations")]
    NotAsync { provider: String, element: TypeRef },

    #[error("the provider '{provider}' for source of type Queryable<{element}> does not support asynchronous enumeration")]
    NotAsyncEnumerable { provider: String, element: TypeRef },

    /// Cancellation observed by the provider. Not a failure of the query.
    #[error("the operation was cancelled")]
    Cancelled,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("sequence contains no elements")]
    EmptySequence,

    #[error("sequence contains more than one element")]
    MoreThanOneElement,

    #[error("duplicate key '{0}' while building a map")]
    DuplicateKey(String),

    #[error("the include path expression must refer to a navigation property: {0}")]
    InvalidIncludePath(String),

    #[error(transparent)]
    Operator(#[from] OpError),

    #[error("result conversion failed: {0}")]
    Conversion(#[from] CoreError),
}

impl ExecError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecError::Cancelled)
    }
}
