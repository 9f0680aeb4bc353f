//! Process-wide operator registry.
//!
//! Maps `OperatorKey -> Arc<OperatorTemplate>`. Each key is matched at most
//! once per registry; later lookups hand out the same `Arc`. Readers share a
//! read lock and never wait on each other once the table is populated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use entiq_core::config::EntiqConfig;
use entiq_core::id::{IdSequence, TemplateId};

use crate::error::Result;
use crate::key::{OperatorId, OperatorKey};
use crate::matcher;
use crate::template::OperatorTemplate;

#[derive(Debug, Default)]
pub struct Registry {
    templates: RwLock<HashMap<OperatorKey, Arc<OperatorTemplate>>>,
    ids: IdSequence,
    resolutions: AtomicUsize,
}

impl Registry {
    /// Empty registry; templates are resolved on first lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every supported operator resolved up front.
    ///
    /// A catalog defect surfaces here instead of on the first query.
    pub fn prepopulated() -> Result<Self> {
        let registry = Self::new();
        for id in OperatorId::all() {
            registry.get_or_create(&id.key())?;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(templates = registry.len(), "operator registry populated");
        Ok(registry)
    }

    pub fn from_config(cfg: &EntiqConfig) -> Result<Self> {
        if cfg.eager_registry {
            Self::prepopulated()
        } else {
            Ok(Self::new())
        }
    }

    pub fn get_or_create(&self, key: &OperatorKey) -> Result<Arc<OperatorTemplate>> {
        if let Some(t) = self.read().get(key) {
            return Ok(Arc::clone(t));
        }

        // Match outside the lock; a concurrent winner's entry is kept.
        let def = matcher::resolve_key(key)?;
        self.resolutions.fetch_add(1, Ordering::Relaxed);

        let mut map = self
            .templates
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(key.clone()).or_insert_with(|| {
            let id: TemplateId = self.ids.next();
            #[cfg(feature = "tracing")]
            tracing::trace!(%key, %id, "operator template cached");
            Arc::new(OperatorTemplate::new(id, key.clone(), def))
        });
        Ok(Arc::clone(entry))
    }

    pub fn template(&self, id: OperatorId) -> Result<Arc<OperatorTemplate>> {
        self.get_or_create(&id.key())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times the matcher has run for this registry.
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Cached templates ordered by id.
    pub fn templates(&self) -> Vec<Arc<OperatorTemplate>> {
        let mut all: Vec<_> = self.read().values().cloned().collect();
        all.sort_by_key(|t| t.id());
        all
    }

    fn read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<OperatorKey, Arc<OperatorTemplate>>> {
        self.templates.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The shared registry, built on first access from `EntiqConfig::from_env`.
    ///
    /// # Panics
    ///
    /// Panics on first access if eager population finds a catalog defect.
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the shared registry with a fresh one. Intended for tests only;
    /// handles obtained earlier keep the old instance.
    #[cfg(any(test, feature = "test-util"))]
    pub fn reset_global() {
        *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(bootstrap());
    }
}

fn bootstrap() -> Registry {
    Registry::from_config(&EntiqConfig::from_env())
        .expect("operator catalog failed to resolve at startup")
}

static GLOBAL: Lazy<RwLock<Arc<Registry>>> = Lazy::new(|| RwLock::new(Arc::new(bootstrap())));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Numeric;
    use std::thread;

    #[test]
    fn prepopulated_registry_holds_every_operator() {
        let r = Registry::prepopulated().unwrap();
        assert_eq!(r.len(), OperatorId::all().len());
        assert_eq!(r.resolutions(), r.len());
    }

    #[test]
    fn repeated_lookup_returns_same_instance() {
        let r = Registry::new();
        let a = r.template(OperatorId::Count).unwrap();
        let b = r.template(OperatorId::Count).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(r.resolutions(), 1);
    }

    #[test]
    fn lazy_registry_fills_on_demand() {
        let r = Registry::new();
        assert!(r.is_empty());
        r.template(OperatorId::AverageBy(Numeric::NullableDecimal))
            .unwrap();
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn concurrent_first_access_yields_one_template() {
        let r = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&r);
                thread::spawn(move || r.template(OperatorId::FirstWhere).unwrap())
            })
            .collect();
        let got: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for t in &got[1..] {
            assert!(Arc::ptr_eq(&got[0], t));
        }
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn global_reset_installs_new_instance() {
        let before = Registry::global();
        Registry::reset_global();
        let after = Registry::global();
        assert!(!Arc::ptr_eq(&before, &after));
        let a = after.template(OperatorId::Any).unwrap();
        let b = Registry::global().template(OperatorId::Any).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
