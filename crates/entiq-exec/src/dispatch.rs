//! Async capability check and dispatch.
//!
//! `execute_async` is the single suspension boundary between a query and
//! its provider: capability is checked synchronously, then the rewritten
//! call and the caller's token are handed over unchanged. There is no
//! synchronous fallback.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use entiq_core::expr::Expr;
use entiq_core::value::{FromValue, Value};

use crate::error::{ExecError, Result};
use crate::metrics;
use crate::query::Query;

/// Pending result of one async operator call.
///
/// Resolves to the provider's value converted into `R`.
#[must_use = "futures do nothing unless awaited"]
pub struct QueryFuture<R> {
    inner: BoxFuture<'static, Result<Value>>,
    _marker: PhantomData<fn() -> R>,
}

impl<R> QueryFuture<R> {
    pub(crate) fn new(inner: BoxFuture<'static, Result<Value>>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<R: FromValue> Future for QueryFuture<R> {
    type Output = Result<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.inner
            .as_mut()
            .poll(cx)
            .map(|res| res.and_then(|v| R::from_value(v).map_err(ExecError::from)))
    }
}

/// Submit `call` to the sequence's provider for asynchronous evaluation.
///
/// Fails with `ExecError::NotAsync` before any future exists when the
/// provider lacks the async capability.
pub fn execute_async<T, R>(
    sequence: &Query<T>,
    call: Expr,
    cancel: CancellationToken,
) -> Result<QueryFuture<R>> {
    let provider = sequence.provider();
    let Some(exec) = provider.as_async() else {
        #[cfg(feature = "tracing")]
        tracing::warn!(provider = provider.name(), element = %sequence.element_type(), "provider is not async");
        return Err(ExecError::NotAsync {
            provider: provider.name().to_string(),
            element: sequence.element_type().clone(),
        });
    };
    metrics::emit_span(
        "dispatch",
        &[
            ("provider", provider.name().to_string()),
            ("call", call_name(&call)),
        ],
    );
    Ok(QueryFuture::new(exec.execute_async(call, cancel)))
}

/// Stream the rows of the sequence's current expression.
pub fn stream_async<T>(
    sequence: &Query<T>,
    cancel: CancellationToken,
) -> Result<BoxStream<'static, Result<Value>>> {
    let provider = sequence.provider();
    let Some(en) = provider.as_async_enumerable() else {
        return Err(ExecError::NotAsyncEnumerable {
            provider: provider.name().to_string(),
            element: sequence.element_type().clone(),
        });
    };
    metrics::emit_span(
        "enumerate",
        &[("provider", provider.name().to_string())],
    );
    Ok(en.stream_async(sequence.expression().clone(), cancel))
}

fn call_name(e: &Expr) -> String {
    match e {
        Expr::Call { method, .. } => method.to_string(),
        other => other.to_string(),
    }
}
