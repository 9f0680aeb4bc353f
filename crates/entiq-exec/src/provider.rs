//! Provider capability traits.
//!
//! A `QueryProvider` is whatever backs a `Query`. Optional capabilities are
//! separate traits reached through the `as_*` accessors; a provider opts in by
//! overriding the accessor to return `Some(self)`. Absence is the default.

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use entiq_core::expr::Expr;
use entiq_core::value::Value;

use crate::error::Result;

pub trait QueryProvider: Send + Sync {
    /// Stable name used in errors and logs.
    fn name(&self) -> &str;

    fn as_async(&self) -> Option<&dyn AsyncQueryProvider> {
        None
    }

    fn as_async_enumerable(&self) -> Option<&dyn AsyncEnumerableProvider> {
        None
    }

    fn as_includable(&self) -> Option<&dyn Includable> {
        None
    }

    fn as_trackable(&self) -> Option<&dyn Trackable> {
        None
    }
}

/// Asynchronous execution of a rewritten operator call.
///
/// Implementations own cancellation: an already-cancelled token should be
/// rejected with `ExecError::Cancelled` before any work is submitted, and a
/// token cancelled mid-flight may abandon the work with the same error.
/// Implementations need not be re-entrant; callers serialize operations
/// against one provider.
pub trait AsyncQueryProvider: Send + Sync {
    fn execute_async(&self, expr: Expr, cancel: CancellationToken)
        -> BoxFuture<'static, Result<Value>>;
}

/// Asynchronous enumeration of a sequence expression, one row per item.
pub trait AsyncEnumerableProvider: Send + Sync {
    fn stream_async(&self, expr: Expr, cancel: CancellationToken)
        -> BoxStream<'static, Result<Value>>;
}

/// Eager loading of related entities along a dotted navigation path.
pub trait Includable: Send + Sync {
    fn include(&self, expr: Expr, path: &str) -> Expr;
}

/// Queries whose results are not attached to change tracking.
pub trait Trackable: Send + Sync {
    fn as_no_tracking(&self, expr: Expr) -> Expr;
}
