//! In-memory store for tests and the `memory://` connection scheme.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use entiq_core::hash::Fingerprint;

use crate::context::DbContext;
use crate::error::{DbError, Result};
use crate::model::Model;
use crate::store::{ModelCompatibility, StoreOperations};

/// Thread-safe store keyed by connection, recording each store's model
/// fingerprint (or no metadata at all).
#[derive(Clone, Default)]
pub struct MemoryStore {
    stores: Arc<Mutex<HashMap<String, Option<Fingerprint>>>>,
    creates: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a store created for `model` (used by tests).
    pub fn insert(&self, connection: &str, model: &Model) -> Result<()> {
        let fp = model.fingerprint()?;
        self.lock().insert(connection.to_string(), Some(fp));
        Ok(())
    }

    /// Pre-populate a store that carries no model metadata.
    pub fn insert_without_metadata(&self, connection: &str) {
        self.lock().insert(connection.to_string(), None);
    }

    /// Number of successful `create` calls.
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of `delete_if_exists` calls that removed a store.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Option<Fingerprint>>> {
        self.stores.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl StoreOperations for MemoryStore {
    fn exists(&self, connection: &str) -> Result<bool> {
        Ok(self.lock().contains_key(connection))
    }

    fn create(&self, connection: &str, model: &Model) -> Result<()> {
        let fp = model.fingerprint()?;
        let mut stores = self.lock();
        if stores.contains_key(connection) {
            return Err(DbError::Store(format!("store '{}' already exists", connection)));
        }
        stores.insert(connection.to_string(), Some(fp));
        self.creates.fetch_add(1, Ordering::SeqCst);
        #[cfg(feature = "tracing")]
        tracing::debug!(connection, model = %fp.short(), "memory store created");
        Ok(())
    }

    fn delete_if_exists(&self, connection: &str) -> Result<bool> {
        let removed = self.lock().remove(connection).is_some();
        if removed {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            #[cfg(feature = "tracing")]
            tracing::debug!(connection, "memory store deleted");
        }
        Ok(removed)
    }
}

impl ModelCompatibility for MemoryStore {
    fn compatible_with_model(&self, ctx: &dyn DbContext, throw_if_no_metadata: bool) -> Result<bool> {
        let recorded = self.lock().get(ctx.connection()).copied().flatten();
        match recorded {
            Some(fp) => Ok(fp == ctx.model().fingerprint()?),
            None if throw_if_no_metadata => Err(DbError::NoMetadata {
                database: ctx.connection().to_string(),
            }),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BasicContext;
    use crate::model::EntityDef;
    use entiq_core::types::TypeRef;

    fn model(ty: TypeRef) -> Model {
        Model::new().entity(EntityDef::new("Order").field("id", ty))
    }

    #[test]
    fn create_then_delete_is_idempotent() {
        let store = MemoryStore::new();
        let m = model(TypeRef::INT32);
        assert!(!store.exists("db1").unwrap());
        store.create("db1", &m).unwrap();
        assert!(store.exists("db1").unwrap());
        assert!(store.create("db1", &m).is_err());
        assert_eq!(store.creates(), 1);
        assert!(store.delete_if_exists("db1").unwrap());
        assert!(!store.delete_if_exists("db1").unwrap());
        assert_eq!(store.deletes(), 1);
    }

    #[test]
    fn compatibility_compares_fingerprints() {
        let store = MemoryStore::new();
        store.insert("db1", &model(TypeRef::INT32)).unwrap();
        let same = BasicContext::new("OrdersContext", model(TypeRef::INT32), "db1");
        let changed = BasicContext::new("OrdersContext", model(TypeRef::INT64), "db1");
        assert!(store.compatible_with_model(&same, true).unwrap());
        assert!(!store.compatible_with_model(&changed, true).unwrap());
    }

    #[test]
    fn missing_metadata_honours_throw_flag() {
        let store = MemoryStore::new();
        store.insert_without_metadata("legacy");
        let ctx = BasicContext::new("LegacyContext", model(TypeRef::INT32), "legacy");
        assert!(store.compatible_with_model(&ctx, false).unwrap());
        assert!(matches!(
            store.compatible_with_model(&ctx, true),
            Err(DbError::NoMetadata { database }) if database == "legacy"
        ));
    }
}
