//! The context seen by stores, initializers and seeders.

use std::sync::atomic::{AtomicUsize, Ordering};

use entiq_core::config::EntiqConfig;

use crate::error::Result;
use crate::model::Model;

pub trait DbContext: Send + Sync {
    /// Name of the context type; part of the gate key and of mismatch errors.
    fn context_type(&self) -> &str;

    fn model(&self) -> &Model;

    /// Connection identity, e.g. `memory://orders`.
    fn connection(&self) -> &str;

    /// Persist staged changes, returning how many were written.
    fn save_changes(&self) -> Result<usize>;
}

/// A context that only counts staged changes.
#[derive(Debug)]
pub struct BasicContext {
    context_type: String,
    model: Model,
    connection: String,
    pending: AtomicUsize,
    saved: AtomicUsize,
}

impl BasicContext {
    pub fn new(context_type: impl Into<String>, model: Model, connection: impl Into<String>) -> Self {
        Self {
            context_type: context_type.into(),
            model,
            connection: connection.into(),
            pending: AtomicUsize::new(0),
            saved: AtomicUsize::new(0),
        }
    }

    /// Context on the configured default connection.
    pub fn from_config(context_type: impl Into<String>, model: Model, cfg: &EntiqConfig) -> Self {
        Self::new(context_type, model, cfg.default_connection.clone())
    }

    /// Stage `n` changes for the next `save_changes`.
    pub fn stage(&self, n: usize) {
        self.pending.fetch_add(n, Ordering::SeqCst);
    }

    /// Total changes persisted so far.
    pub fn saved(&self) -> usize {
        self.saved.load(Ordering::SeqCst)
    }
}

impl DbContext for BasicContext {
    fn context_type(&self) -> &str {
        &self.context_type
    }

    fn model(&self) -> &Model {
        &self.model
    }

    fn connection(&self) -> &str {
        &self.connection
    }

    fn save_changes(&self) -> Result<usize> {
        let n = self.pending.swap(0, Ordering::SeqCst);
        self.saved.fetch_add(n, Ordering::SeqCst);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_changes_flushes_staged_count() {
        let ctx = BasicContext::from_config("OrdersContext", Model::new(), &EntiqConfig::default());
        assert_eq!(ctx.connection(), "memory://default");
        ctx.stage(3);
        assert_eq!(ctx.save_changes().unwrap(), 3);
        assert_eq!(ctx.save_changes().unwrap(), 0);
        assert_eq!(ctx.saved(), 3);
    }
}
