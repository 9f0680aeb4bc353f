//! In-memory providers for tests and demos.
//!
//! `RecordingProvider` answers every call with canned values and records
//! the expressions it was handed. `SyncOnlyProvider` has no async
//! capability at all.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;

use entiq_core::expr::{Expr, MethodRef};
use entiq_core::id::{IdSequence, SubmissionId};
use entiq_core::types::TypeRef;
use entiq_core::value::Value;

use crate::error::{ExecError, Result};
use crate::provider::{
    AsyncEnumerableProvider, AsyncQueryProvider, Includable, QueryProvider, Trackable,
};

#[derive(Default)]
struct State {
    results: VecDeque<Value>,
    fallback: Option<Value>,
    rows: Vec<Value>,
    ids: IdSequence,
    submitted: Vec<(SubmissionId, Expr)>,
    hang: bool,
}

/// Thread-safe provider with scripted results.
#[derive(Clone)]
pub struct RecordingProvider {
    state: Arc<Mutex<State>>,
    enumerable: bool,
    includable: bool,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            enumerable: true,
            includable: true,
        }
    }

    /// Answer every call with `v` once the queue is empty.
    pub fn with_result(self, v: impl Into<Value>) -> Self {
        self.lock().fallback = Some(v.into());
        self
    }

    /// Queue a one-shot result, consumed in call order.
    pub fn push_result(&self, v: impl Into<Value>) {
        self.lock().results.push_back(v.into());
    }

    /// Rows returned by enumeration.
    pub fn with_rows(self, rows: Vec<Value>) -> Self {
        self.lock().rows = rows;
        self
    }

    /// Calls never complete on their own; only cancellation ends them.
    pub fn hanging(self) -> Self {
        self.lock().hang = true;
        self
    }

    pub fn without_enumeration(mut self) -> Self {
        self.enumerable = false;
        self
    }

    pub fn without_include(mut self) -> Self {
        self.includable = false;
        self
    }

    /// Expressions handed to `execute_async` and `stream_async`, in order.
    pub fn submitted(&self) -> Vec<Expr> {
        self.lock().submitted.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Accepted calls with the id each was recorded under. Calls rejected
    /// for cancellation never get an id.
    pub fn submissions(&self) -> Vec<(SubmissionId, Expr)> {
        self.lock().submitted.clone()
    }

    pub fn submission(&self, id: SubmissionId) -> Option<Expr> {
        self.lock()
            .submitted
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, e)| e.clone())
    }

    pub fn last_submitted(&self) -> Option<Expr> {
        self.lock().submitted.last().map(|(_, e)| e.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn record(&self, expr: Expr) -> SubmissionId {
        let mut st = self.lock();
        let id: SubmissionId = st.ids.next();
        st.submitted.push((id, expr));
        id
    }
}

impl Default for RecordingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    fn as_async(&self) -> Option<&dyn AsyncQueryProvider> {
        Some(self)
    }

    fn as_async_enumerable(&self) -> Option<&dyn AsyncEnumerableProvider> {
        if self.enumerable {
            Some(self)
        } else {
            None
        }
    }

    fn as_includable(&self) -> Option<&dyn Includable> {
        if self.includable {
            Some(self)
        } else {
            None
        }
    }

    fn as_trackable(&self) -> Option<&dyn Trackable> {
        Some(self)
    }
}

impl AsyncQueryProvider for RecordingProvider {
    fn execute_async(&self, expr: Expr, cancel: CancellationToken) -> BoxFuture<'static, Result<Value>> {
        if cancel.is_cancelled() {
            return futures::future::ready(Err(ExecError::Cancelled)).boxed();
        }
        let _id = self.record(expr);
        #[cfg(feature = "tracing")]
        tracing::trace!(submission = %_id, "recording provider accepted call");

        let (hang, next) = {
            let mut st = self.lock();
            let next = st.results.pop_front().or_else(|| st.fallback.clone());
            (st.hang, next)
        };
        if hang {
            return async move {
                cancel.cancelled().await;
                Err(ExecError::Cancelled)
            }
            .boxed();
        }
        let result = next.ok_or_else(|| ExecError::Provider("no scripted result".to_string()));
        futures::future::ready(result).boxed()
    }
}

impl AsyncEnumerableProvider for RecordingProvider {
    fn stream_async(&self, expr: Expr, cancel: CancellationToken) -> BoxStream<'static, Result<Value>> {
        if cancel.is_cancelled() {
            return futures::stream::once(futures::future::ready(Err(ExecError::Cancelled))).boxed();
        }
        self.record(expr);
        let rows = self.lock().rows.clone();
        // Stop at the first row observed after cancellation.
        futures::stream::iter(rows)
            .map(move |row| {
                if cancel.is_cancelled() {
                    Err(ExecError::Cancelled)
                } else {
                    Ok(row)
                }
            })
            .scan(false, |stopped, item| {
                let out = if *stopped {
                    None
                } else {
                    *stopped = item.is_err();
                    Some(item)
                };
                futures::future::ready(out)
            })
            .boxed()
    }
}

fn wrap(name: &str, expr: Expr, extra: Vec<Expr>) -> Expr {
    let ty = expr.ty();
    let element = ty.element().cloned().unwrap_or_else(|| ty.clone());
    let mut params = vec![ty.clone()];
    params.extend(extra.iter().map(Expr::ty));
    let mut args = vec![expr];
    args.extend(extra);
    Expr::Call {
        method: MethodRef {
            name: name.to_string(),
            type_args: vec![element],
            params,
            ret: ty,
        },
        args,
    }
}

impl Includable for RecordingProvider {
    fn include(&self, expr: Expr, path: &str) -> Expr {
        let path = Expr::Constant {
            value: Value::Str(path.to_string()),
            ty: TypeRef::STRING,
        };
        wrap("Include", expr, vec![path])
    }
}

impl Trackable for RecordingProvider {
    fn as_no_tracking(&self, expr: Expr) -> Expr {
        wrap("AsNoTracking", expr, vec![])
    }
}

/// Provider with only a synchronous path.
#[derive(Default)]
pub struct SyncOnlyProvider {
    executions: AtomicUsize,
}

impl SyncOnlyProvider {
    /// Synchronous execution. The async dispatcher never calls this.
    pub fn execute(&self, _expr: &Expr) -> Value {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Value::Null
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl QueryProvider for SyncOnlyProvider {
    fn name(&self) -> &str {
        "sync-only"
    }
}
