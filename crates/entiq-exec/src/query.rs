//! Typed sequence handles.
//!
//! A `Query<T>` pairs an expression tree with the provider that will
//! translate it. Composition (`filter`, `select`, `take`, ...) only builds a
//! new tree; nothing reaches the provider until an async operator runs.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use entiq_core::expr::Expr;
use entiq_core::types::{ElementType, TypeRef};
use entiq_operators::{rewrite, OpError, OperatorId, Registry};

use crate::error::{ExecError, Result};
use crate::provider::QueryProvider;

pub struct Query<T> {
    expr: Expr,
    element: TypeRef,
    provider: Arc<dyn QueryProvider>,
    registry: Arc<Registry>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            expr: self.expr.clone(),
            element: self.element.clone(),
            provider: Arc::clone(&self.provider),
            registry: Arc::clone(&self.registry),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("element", &self.element)
            .field("provider", &self.provider.name())
            .field("expr", &self.expr.to_string())
            .finish()
    }
}

impl<T: ElementType> Query<T> {
    /// Root query over a named source.
    pub fn new(source: impl Into<String>, provider: Arc<dyn QueryProvider>) -> Self {
        let element = T::type_ref();
        Self::from_parts(Expr::source(source, element.clone()), element, provider)
    }
}

impl<T> Query<T> {
    /// Wrap an existing tree whose element type is `element`.
    pub fn from_parts(expr: Expr, element: TypeRef, provider: Arc<dyn QueryProvider>) -> Self {
        Self {
            expr,
            element,
            provider,
            registry: Registry::global(),
            _marker: PhantomData,
        }
    }

    /// Resolve operators through `registry` instead of the shared one.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn expression(&self) -> &Expr {
        &self.expr
    }

    pub fn element_type(&self) -> &TypeRef {
        &self.element
    }

    pub fn provider(&self) -> &dyn QueryProvider {
        self.provider.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Rewrite `id` applied to this query's tree.
    pub(crate) fn call(&self, id: OperatorId, extra: Vec<Expr>) -> Result<Expr> {
        let template = self.registry.template(id)?;
        Ok(rewrite(&template, &self.element, self.expr.clone(), extra)?)
    }

    fn derive<U>(&self, expr: Expr, element: TypeRef) -> Query<U> {
        Query {
            expr,
            element,
            provider: Arc::clone(&self.provider),
            registry: Arc::clone(&self.registry),
            _marker: PhantomData,
        }
    }

    pub fn filter(&self, predicate: Expr) -> Result<Query<T>> {
        let expr = self.call(OperatorId::Where, vec![predicate])?;
        Ok(self.derive(expr, self.element.clone()))
    }

    pub fn select<U: ElementType>(&self, selector: Expr) -> Result<Query<U>> {
        let expr = self.call(OperatorId::Select, vec![selector])?;
        let element = U::type_ref();
        if expr.ty() != TypeRef::queryable(element.clone()) {
            return Err(ExecError::Operator(OpError::Rewrite {
                name: "Select".to_string(),
                reason: format!("selector produces {}, not Queryable<{}>", expr.ty(), element),
            }));
        }
        Ok(self.derive(expr, element))
    }

    pub fn order_by(&self, key: Expr) -> Result<Query<T>> {
        let expr = self.call(OperatorId::OrderBy, vec![key])?;
        Ok(self.derive(expr, self.element.clone()))
    }

    pub fn order_by_descending(&self, key: Expr) -> Result<Query<T>> {
        let expr = self.call(OperatorId::OrderByDescending, vec![key])?;
        Ok(self.derive(expr, self.element.clone()))
    }

    pub fn take(&self, count: i32) -> Result<Query<T>> {
        let n = Expr::constant(count, TypeRef::INT32)?;
        let expr = self.call(OperatorId::Take, vec![n])?;
        Ok(self.derive(expr, self.element.clone()))
    }

    pub fn skip(&self, count: i32) -> Result<Query<T>> {
        let n = Expr::constant(count, TypeRef::INT32)?;
        let expr = self.call(OperatorId::Skip, vec![n])?;
        Ok(self.derive(expr, self.element.clone()))
    }

    /// Eager-load `path` when the provider supports it; otherwise the query
    /// is returned unchanged.
    pub fn include(&self, path: &str) -> Query<T> {
        match self.provider.as_includable() {
            Some(inc) => self.derive(inc.include(self.expr.clone(), path), self.element.clone()),
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(provider = self.provider.name(), path, "include ignored: provider has no include capability");
                self.clone()
            }
        }
    }

    /// `include` with the path given as a member-access lambda.
    pub fn include_path(&self, lambda: &Expr) -> Result<Query<T>> {
        let path = parse_include_path(lambda)?;
        Ok(self.include(&path))
    }

    /// Detach results from change tracking when the provider supports it;
    /// otherwise the query is returned unchanged.
    pub fn as_no_tracking(&self) -> Query<T> {
        match self.provider.as_trackable() {
            Some(t) => self.derive(t.as_no_tracking(self.expr.clone()), self.element.clone()),
            None => self.clone(),
        }
    }
}

/// Turn `x => x.a.b` into `"a.b"`.
///
/// A `Select` call on a collection navigation continues the path through
/// its own lambda: `x => x.lines.Select(l => l.product)` yields
/// `"lines.product"`.
pub fn parse_include_path(lambda: &Expr) -> Result<String> {
    let invalid = || ExecError::InvalidIncludePath(lambda.to_string());
    let (params, body) = lambda.as_lambda().ok_or_else(invalid)?;
    let [param] = params else {
        return Err(invalid());
    };
    let mut parts = Vec::new();
    if !collect_path(body, &param.name, &mut parts) || parts.is_empty() {
        return Err(invalid());
    }
    Ok(parts.join("."))
}

fn collect_path(e: &Expr, root: &str, out: &mut Vec<String>) -> bool {
    match e {
        Expr::Parameter(p) => p.name == root,
        Expr::Member { target, member, .. } => {
            if !collect_path(target, root, out) {
                return false;
            }
            out.push(member.clone());
            true
        }
        Expr::Call { method, args } if method.name == "Select" && args.len() == 2 => {
            if !collect_path(&args[0], root, out) {
                return false;
            }
            let Some((inner_params, inner_body)) = args[1].as_lambda() else {
                return false;
            };
            match inner_params {
                [p] => {
                    let before = out.len();
                    collect_path(inner_body, &p.name, out) && out.len() > before
                }
                _ => false,
            }
        }
        _ => false,
    }
}
