#![forbid(unsafe_code)]
//! entiq-exec: provider capabilities, typed queries, and async dispatch.
//!
//! A `Query<T>` carries an expression tree and the provider that will
//! translate it. Async operators rewrite the tree through the operator
//! registry and hand the call to the provider together with the caller's
//! `CancellationToken`. Providers without the async capability are
//! rejected before anything is submitted.

pub mod dispatch;
pub mod error;
pub mod extensions;
pub mod memory;
pub mod metrics;
pub mod provider;
pub mod query;

pub use dispatch::{execute_async, stream_async, QueryFuture};
pub use error::{ExecError, Result};
pub use memory::{RecordingProvider, SyncOnlyProvider};
pub use provider::{
    AsyncEnumerableProvider, AsyncQueryProvider, Includable, QueryProvider, Trackable,
};
pub use query::{parse_include_path, Query};
pub use tokio_util::sync::CancellationToken;
