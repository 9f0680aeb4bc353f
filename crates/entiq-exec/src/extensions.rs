//! Async operators on `Query<T>`.
//!
//! Every operator comes in two forms: `*_with(.., cancel)` and a form that
//! passes an empty token. Plain and predicate/selector overloads share one
//! path (`run`): the plain form differs only in its operator id and an
//! empty argument list.
//!
//! Each method returns `Err` synchronously when the provider cannot run the
//! call asynchronously; otherwise it returns a future to await.
//!
//! Callers must not issue concurrent operations against one provider; the
//! provider is not required to be re-entrant.

use std::collections::HashMap;
use std::hash::Hash;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

use entiq_core::expr::Expr;
use entiq_core::value::{FromValue, Value};
use entiq_operators::{Numeric, OpError, OperatorId};

use crate::dispatch::{execute_async, stream_async, QueryFuture};
use crate::error::{ExecError, Result};
use crate::query::Query;

macro_rules! without_token {
    ($($(#[$m:meta])* $name:ident => $with:ident ( $($arg:ident : $ty:ty),* ) -> $ret:ty;)*) => {
        $(
            $(#[$m])*
            pub fn $name(&self, $($arg: $ty),*) -> Result<QueryFuture<$ret>> {
                self.$with($($arg,)* CancellationToken::new())
            }
        )*
    };
}

impl<T> Query<T> {
    fn run<R>(&self, id: OperatorId, extra: Vec<Expr>, cancel: CancellationToken) -> Result<QueryFuture<R>> {
        let call = self.call(id, extra)?;
        execute_async(self, call, cancel)
    }

    fn numeric_element(&self, op: &str) -> Result<Numeric> {
        Numeric::from_type_ref(self.element_type()).ok_or_else(|| {
            ExecError::Operator(OpError::Unsupported(format!(
                "{} over {}",
                op,
                self.element_type()
            )))
        })
    }

    fn numeric_selector(op: &str, selector: &Expr) -> Result<Numeric> {
        let result = selector
            .as_lambda()
            .map(|(_, body)| body.ty())
            .unwrap_or_else(|| selector.ty());
        Numeric::from_type_ref(&result).ok_or_else(|| {
            ExecError::Operator(OpError::Unsupported(format!("{} of {}", op, result)))
        })
    }

    pub fn first_async_with(&self, cancel: CancellationToken) -> Result<QueryFuture<T>> {
        self.run(OperatorId::First, vec![], cancel)
    }

    pub fn first_where_async_with(&self, predicate: Expr, cancel: CancellationToken) -> Result<QueryFuture<T>> {
        self.run(OperatorId::FirstWhere, vec![predicate], cancel)
    }

    /// Resolves to `None` when the sequence is empty.
    pub fn first_or_default_async_with(&self, cancel: CancellationToken) -> Result<QueryFuture<Option<T>>> {
        self.run(OperatorId::FirstOrDefault, vec![], cancel)
    }

    pub fn first_or_default_where_async_with(
        &self,
        predicate: Expr,
        cancel: CancellationToken,
    ) -> Result<QueryFuture<Option<T>>> {
        self.run(OperatorId::FirstOrDefaultWhere, vec![predicate], cancel)
    }

    pub fn single_async_with(&self, cancel: CancellationToken) -> Result<QueryFuture<T>> {
        self.run(OperatorId::Single, vec![], cancel)
    }

    pub fn single_where_async_with(&self, predicate: Expr, cancel: CancellationToken) -> Result<QueryFuture<T>> {
        self.run(OperatorId::SingleWhere, vec![predicate], cancel)
    }

    pub fn single_or_default_async_with(&self, cancel: CancellationToken) -> Result<QueryFuture<Option<T>>> {
        self.run(OperatorId::SingleOrDefault, vec![], cancel)
    }

    pub fn single_or_default_where_async_with(
        &self,
        predicate: Expr,
        cancel: CancellationToken,
    ) -> Result<QueryFuture<Option<T>>> {
        self.run(OperatorId::SingleOrDefaultWhere, vec![predicate], cancel)
    }

    pub fn contains_async_with(&self, item: impl Into<Value>, cancel: CancellationToken) -> Result<QueryFuture<bool>> {
        let item = Expr::constant(item, self.element_type().clone())?;
        self.run(OperatorId::Contains, vec![item], cancel)
    }

    pub fn contains_async(&self, item: impl Into<Value>) -> Result<QueryFuture<bool>> {
        self.contains_async_with(item, CancellationToken::new())
    }

    pub fn any_async_with(&self, cancel: CancellationToken) -> Result<QueryFuture<bool>> {
        self.run(OperatorId::Any, vec![], cancel)
    }

    pub fn any_where_async_with(&self, predicate: Expr, cancel: CancellationToken) -> Result<QueryFuture<bool>> {
        self.run(OperatorId::AnyWhere, vec![predicate], cancel)
    }

    pub fn all_async_with(&self, predicate: Expr, cancel: CancellationToken) -> Result<QueryFuture<bool>> {
        self.run(OperatorId::All, vec![predicate], cancel)
    }

    pub fn count_async_with(&self, cancel: CancellationToken) -> Result<QueryFuture<i32>> {
        self.run(OperatorId::Count, vec![], cancel)
    }

    pub fn count_where_async_with(&self, predicate: Expr, cancel: CancellationToken) -> Result<QueryFuture<i32>> {
        self.run(OperatorId::CountWhere, vec![predicate], cancel)
    }

    pub fn long_count_async_with(&self, cancel: CancellationToken) -> Result<QueryFuture<i64>> {
        self.run(OperatorId::LongCount, vec![], cancel)
    }

    pub fn long_count_where_async_with(&self, predicate: Expr, cancel: CancellationToken) -> Result<QueryFuture<i64>> {
        self.run(OperatorId::LongCountWhere, vec![predicate], cancel)
    }

    pub fn min_async_with(&self, cancel: CancellationToken) -> Result<QueryFuture<T>> {
        self.run(OperatorId::Min, vec![], cancel)
    }

    pub fn max_async_with(&self, cancel: CancellationToken) -> Result<QueryFuture<T>> {
        self.run(OperatorId::Max, vec![], cancel)
    }

    pub fn min_by_async_with<R>(&self, selector: Expr, cancel: CancellationToken) -> Result<QueryFuture<R>> {
        self.run(OperatorId::MinBy, vec![selector], cancel)
    }

    pub fn min_by_async<R>(&self, selector: Expr) -> Result<QueryFuture<R>> {
        self.min_by_async_with(selector, CancellationToken::new())
    }

    pub fn max_by_async_with<R>(&self, selector: Expr, cancel: CancellationToken) -> Result<QueryFuture<R>> {
        self.run(OperatorId::MaxBy, vec![selector], cancel)
    }

    pub fn max_by_async<R>(&self, selector: Expr) -> Result<QueryFuture<R>> {
        self.max_by_async_with(selector, CancellationToken::new())
    }

    /// Sum of a numeric sequence. `R` must match the sum type of the
    /// element (e.g. `Option<i32>` for a sequence of `Int32?`).
    pub fn sum_async_with<R>(&self, cancel: CancellationToken) -> Result<QueryFuture<R>> {
        let n = self.numeric_element("Sum")?;
        self.run(OperatorId::Sum(n), vec![], cancel)
    }

    pub fn sum_async<R>(&self) -> Result<QueryFuture<R>> {
        self.sum_async_with(CancellationToken::new())
    }

    pub fn sum_by_async_with<R>(&self, selector: Expr, cancel: CancellationToken) -> Result<QueryFuture<R>> {
        let n = Self::numeric_selector("Sum", &selector)?;
        self.run(OperatorId::SumBy(n), vec![selector], cancel)
    }

    pub fn sum_by_async<R>(&self, selector: Expr) -> Result<QueryFuture<R>> {
        self.sum_by_async_with(selector, CancellationToken::new())
    }

    /// Average of a numeric sequence; integer elements average to `f64`.
    pub fn average_async_with<R>(&self, cancel: CancellationToken) -> Result<QueryFuture<R>> {
        let n = self.numeric_element("Average")?;
        self.run(OperatorId::Average(n), vec![], cancel)
    }

    pub fn average_async<R>(&self) -> Result<QueryFuture<R>> {
        self.average_async_with(CancellationToken::new())
    }

    pub fn average_by_async_with<R>(&self, selector: Expr, cancel: CancellationToken) -> Result<QueryFuture<R>> {
        let n = Self::numeric_selector("Average", &selector)?;
        self.run(OperatorId::AverageBy(n), vec![selector], cancel)
    }

    pub fn average_by_async<R>(&self, selector: Expr) -> Result<QueryFuture<R>> {
        self.average_by_async_with(selector, CancellationToken::new())
    }

    without_token! {
        first_async => first_async_with() -> T;
        first_where_async => first_where_async_with(predicate: Expr) -> T;
        first_or_default_async => first_or_default_async_with() -> Option<T>;
        first_or_default_where_async => first_or_default_where_async_with(predicate: Expr) -> Option<T>;
        single_async => single_async_with() -> T;
        single_where_async => single_where_async_with(predicate: Expr) -> T;
        single_or_default_async => single_or_default_async_with() -> Option<T>;
        single_or_default_where_async => single_or_default_where_async_with(predicate: Expr) -> Option<T>;
        any_async => any_async_with() -> bool;
        any_where_async => any_where_async_with(predicate: Expr) -> bool;
        all_async => all_async_with(predicate: Expr) -> bool;
        count_async => count_async_with() -> i32;
        count_where_async => count_where_async_with(predicate: Expr) -> i32;
        long_count_async => long_count_async_with() -> i64;
        long_count_where_async => long_count_where_async_with(predicate: Expr) -> i64;
        min_async => min_async_with() -> T;
        max_async => max_async_with() -> T;
    }
}

impl<T> Query<T>
where
    T: FromValue + Send + 'static,
{
    /// Collect every row. Needs the async enumeration capability.
    pub fn to_list_async_with(&self, cancel: CancellationToken) -> Result<BoxFuture<'static, Result<Vec<T>>>> {
        let rows = stream_async(self, cancel)?;
        Ok(rows
            .and_then(|v| futures::future::ready(T::from_value(v).map_err(ExecError::from)))
            .try_collect::<Vec<T>>()
            .boxed())
    }

    pub fn to_list_async(&self) -> Result<BoxFuture<'static, Result<Vec<T>>>> {
        self.to_list_async_with(CancellationToken::new())
    }

    /// Collect rows into a map keyed by `key`; a repeated key is an error.
    pub fn to_map_async_with<K, F>(
        &self,
        key: F,
        cancel: CancellationToken,
    ) -> Result<BoxFuture<'static, Result<HashMap<K, T>>>>
    where
        K: Eq + Hash + std::fmt::Debug + Send + 'static,
        F: Fn(&T) -> K + Send + 'static,
    {
        let mut rows = stream_async(self, cancel)?;
        Ok(async move {
            let mut out = HashMap::new();
            while let Some(v) = rows.next().await {
                let item = T::from_value(v?)?;
                let k = key(&item);
                if out.contains_key(&k) {
                    return Err(ExecError::DuplicateKey(format!("{:?}", k)));
                }
                out.insert(k, item);
            }
            Ok(out)
        }
        .boxed())
    }

    pub fn to_map_async<K, F>(&self, key: F) -> Result<BoxFuture<'static, Result<HashMap<K, T>>>>
    where
        K: Eq + Hash + std::fmt::Debug + Send + 'static,
        F: Fn(&T) -> K + Send + 'static,
    {
        self.to_map_async_with(key, CancellationToken::new())
    }

    /// Run `action` on every row as it arrives.
    pub fn for_each_async_with<F>(
        &self,
        mut action: F,
        cancel: CancellationToken,
    ) -> Result<BoxFuture<'static, Result<()>>>
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut rows = stream_async(self, cancel)?;
        Ok(async move {
            while let Some(v) = rows.next().await {
                action(T::from_value(v?)?);
            }
            Ok(())
        }
        .boxed())
    }

    pub fn for_each_async<F>(&self, action: F) -> Result<BoxFuture<'static, Result<()>>>
    where
        F: FnMut(T) + Send + 'static,
    {
        self.for_each_async_with(action, CancellationToken::new())
    }

    /// Enumerate and discard, so that a tracking provider materializes the rows.
    pub fn load_async_with(&self, cancel: CancellationToken) -> Result<BoxFuture<'static, Result<()>>> {
        self.for_each_async_with(|_| {}, cancel)
    }

    pub fn load_async(&self) -> Result<BoxFuture<'static, Result<()>>> {
        self.load_async_with(CancellationToken::new())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use entiq_core::expr::{BinaryOp, Param};
    use entiq_core::types::TypeRef;
    use entiq_operators::Registry;

    use super::*;
    use crate::memory::{RecordingProvider, SyncOnlyProvider};
    use crate::provider::QueryProvider;

    fn numbers(provider: &RecordingProvider) -> Query<i32> {
        Query::new("numbers", Arc::new(provider.clone()) as Arc<dyn QueryProvider>)
            .with_registry(Arc::new(Registry::new()))
    }

    fn positive() -> Expr {
        let x = Param::new("x", TypeRef::INT32);
        Expr::lambda(
            x.clone(),
            Expr::binary(
                BinaryOp::Gt,
                Expr::Parameter(x),
                Expr::constant(0, TypeRef::INT32).unwrap(),
            ),
        )
    }

    #[tokio::test]
    async fn count_resolves_provider_value() {
        let provider = RecordingProvider::new().with_result(42);
        let q = numbers(&provider);
        let n = q.count_async().unwrap().await.unwrap();
        assert_eq!(n, 42);
        assert_eq!(
            provider.last_submitted().unwrap().to_string(),
            "Count<Int32>(numbers)"
        );
    }

    #[tokio::test]
    async fn predicate_overload_quotes_lambda() {
        let provider = RecordingProvider::new().with_result(true);
        let q = numbers(&provider);
        assert!(q.any_where_async(positive()).unwrap().await.unwrap());
        assert_eq!(
            provider.last_submitted().unwrap().to_string(),
            "Any<Int32>(numbers, '(x => (x > 0)))"
        );
    }

    #[tokio::test]
    async fn plain_form_submits_only_the_source() {
        let provider = RecordingProvider::new().with_result(7);
        let q = numbers(&provider);
        q.first_async().unwrap().await.unwrap();
        let submitted = provider.last_submitted().unwrap();
        match submitted {
            Expr::Call { method, args } => {
                assert_eq!(method.name, "First");
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected submission {}", other),
        }
    }

    #[test]
    fn sync_only_provider_fails_before_any_future() {
        let provider: Arc<dyn QueryProvider> = Arc::new(SyncOnlyProvider::default());
        let q: Query<i32> = Query::new("numbers", provider).with_registry(Arc::new(Registry::new()));
        let err = q.count_async().err().unwrap();
        match &err {
            ExecError::NotAsync { provider, element } => {
                assert_eq!(provider, "sync-only");
                assert_eq!(element, &TypeRef::INT32);
            }
            other => panic!("unexpected error {}", other),
        }
        assert!(err.to_string().contains("Queryable<Int32>"));
        assert!(q.to_list_async().is_err());
    }

    #[tokio::test]
    async fn already_cancelled_token_submits_nothing() {
        let provider = RecordingProvider::new().with_result(1);
        let q = numbers(&provider);
        let token = CancellationToken::new();
        token.cancel();
        let err = q.count_async_with(token).unwrap().await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(provider.submitted().is_empty());
    }

    #[tokio::test]
    async fn cancellation_mid_flight_abandons_the_call() {
        let provider = RecordingProvider::new().hanging();
        let q = numbers(&provider);
        let token = CancellationToken::new();
        let fut = q.count_async_with(token.clone()).unwrap();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let err = tokio::time::timeout(Duration::from_secs(5), fut)
            .await
            .expect("cancellation should end the call")
            .unwrap_err();
        assert!(err.is_cancelled());
        canceller.await.unwrap();
        assert_eq!(provider.submitted().len(), 1);
    }

    #[tokio::test]
    async fn sum_and_average_pick_numeric_overloads() {
        let provider = RecordingProvider::new();
        provider.push_result(10);
        provider.push_result(2.5f64);
        let q = numbers(&provider);
        let total: i32 = q.sum_async().unwrap().await.unwrap();
        let mean: f64 = q.average_async().unwrap().await.unwrap();
        assert_eq!(total, 10);
        assert_eq!(mean, 2.5);
        let submitted = provider.submitted();
        match (&submitted[0], &submitted[1]) {
            (Expr::Call { method: sum, .. }, Expr::Call { method: avg, .. }) => {
                assert_eq!(sum.ret, TypeRef::INT32);
                assert_eq!(avg.ret, TypeRef::FLOAT64);
            }
            _ => panic!("expected calls"),
        }
    }

    #[test]
    fn sum_over_non_numeric_is_unsupported() {
        let provider: Arc<dyn QueryProvider> = Arc::new(RecordingProvider::new());
        let q: Query<String> = Query::new("names", provider).with_registry(Arc::new(Registry::new()));
        assert!(matches!(
            q.sum_async::<i32>(),
            Err(ExecError::Operator(OpError::Unsupported(_)))
        ));
    }

    #[tokio::test]
    async fn nullable_sum_resolves_to_option() {
        let provider = RecordingProvider::new().with_result(Value::Null);
        let q: Query<Option<i32>> = Query::new(
            "maybe",
            Arc::new(provider.clone()) as Arc<dyn QueryProvider>,
        )
        .with_registry(Arc::new(Registry::new()));
        let total: Option<i32> = q.sum_async().unwrap().await.unwrap();
        assert_eq!(total, None);
    }

    #[tokio::test]
    async fn contains_embeds_typed_constant() {
        let provider = RecordingProvider::new().with_result(false);
        let q = numbers(&provider);
        assert!(!q.contains_async(3).unwrap().await.unwrap());
        assert_eq!(
            provider.last_submitted().unwrap().to_string(),
            "Contains<Int32>(numbers, 3)"
        );
        assert!(q.contains_async("three").is_err());
    }

    #[tokio::test]
    async fn to_list_and_for_each_enumerate_rows() {
        let provider = RecordingProvider::new().with_rows(vec![1.into(), 2.into(), 3.into()]);
        let q = numbers(&provider);
        assert_eq!(q.to_list_async().unwrap().await.unwrap(), vec![1, 2, 3]);

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        q.for_each_async(move |n| sink.lock().unwrap().push(n * 10))
            .unwrap()
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![10, 20, 30]);
        q.load_async().unwrap().await.unwrap();
        assert_eq!(provider.submitted().len(), 3);
    }

    #[tokio::test]
    async fn to_map_rejects_duplicate_keys() {
        let provider = RecordingProvider::new().with_rows(vec![1.into(), 2.into(), 11.into()]);
        let q = numbers(&provider);
        let by_self = q
            .to_map_async_with(|n| *n, CancellationToken::new())
            .unwrap()
            .await
            .unwrap();
        assert_eq!(by_self.len(), 3);
        let err = q
            .to_map_async_with(|n| n % 10, CancellationToken::new())
            .unwrap()
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::DuplicateKey(k) if k == "1"));
    }

    #[test]
    fn enumeration_requires_capability() {
        let provider = RecordingProvider::new().without_enumeration();
        let q = numbers(&provider);
        assert!(matches!(
            q.to_list_async(),
            Err(ExecError::NotAsyncEnumerable { .. })
        ));
        assert!(q.count_async().is_ok());
    }
}
