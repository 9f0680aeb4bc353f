//! Per-context database operations.

use std::fmt;
use std::sync::Arc;

use entiq_core::config::EntiqConfig;

use crate::context::DbContext;
use crate::error::{DbError, Result};
use crate::gate::{GateKey, GateState, InitializationGate};
use crate::initializer::{self, DatabaseInitializer};
use crate::store::{ModelCompatibility, Store, StoreOperations};

pub struct Database {
    context: Arc<dyn DbContext>,
    store: Arc<dyn Store>,
    initializer: Arc<dyn DatabaseInitializer>,
    gate: Arc<InitializationGate>,
    key: GateKey,
    command_timeout: Option<u64>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("key", &self.key.to_string())
            .field("initializer", &self.initializer.name())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl Database {
    /// Database configured from `ENTIQ_*` environment variables, using the
    /// process-wide gate.
    pub fn new(context: Arc<dyn DbContext>, store: Arc<dyn Store>) -> Result<Self> {
        Self::from_config(context, store, &EntiqConfig::from_env())
    }

    pub fn from_config(
        context: Arc<dyn DbContext>,
        store: Arc<dyn Store>,
        cfg: &EntiqConfig,
    ) -> Result<Self> {
        let key = GateKey::for_context(context.as_ref())?;
        Ok(Self {
            context,
            store,
            initializer: initializer::from_kind(cfg.default_initializer),
            gate: InitializationGate::global(),
            key,
            command_timeout: cfg.command_timeout_secs,
        })
    }

    pub fn with_initializer(mut self, initializer: Arc<dyn DatabaseInitializer>) -> Self {
        self.initializer = initializer;
        self
    }

    /// Track initialization in `gate` instead of the process-wide one.
    pub fn with_gate(mut self, gate: Arc<InitializationGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn key(&self) -> &GateKey {
        &self.key
    }

    pub fn state(&self) -> GateState {
        self.gate.state(&self.key)
    }

    pub fn initializer_name(&self) -> &'static str {
        self.initializer.name()
    }

    /// Run the initialization strategy unless it already ran for this
    /// context, model and connection. `force` re-runs it regardless, e.g.
    /// after the store was deleted out of band. Returns whether it ran.
    pub fn initialize(&self, force: bool) -> Result<bool> {
        let ctx = self.context.as_ref();
        let store = self.store.as_ref();
        let strategy = self.initializer.as_ref();
        self.gate
            .initialize(&self.key, force, || strategy.initialize_database(ctx, store))
    }

    /// Create the store. Fails without touching it when it already exists.
    /// A store created here counts as initialized, so the strategy will not
    /// run for it.
    pub fn create(&self) -> Result<()> {
        let connection = self.context.connection();
        if self.store.exists(connection)? {
            return Err(DbError::AlreadyExists {
                database: connection.to_string(),
            });
        }
        self.store.create(connection, self.context.model())?;
        self.gate.mark_initialized(&self.key);
        Ok(())
    }

    /// Returns `false`, and does nothing, when the store already exists.
    pub fn create_if_not_exists(&self) -> Result<bool> {
        let connection = self.context.connection();
        if self.store.exists(connection)? {
            return Ok(false);
        }
        self.store.create(connection, self.context.model())?;
        self.gate.mark_initialized(&self.key);
        Ok(true)
    }

    pub fn exists(&self) -> Result<bool> {
        self.store.exists(self.context.connection())
    }

    /// Delete the store if present. A deleted store is marked not
    /// initialized so the strategy runs again on next use.
    pub fn delete(&self) -> Result<bool> {
        let deleted = self.store.delete_if_exists(self.context.connection())?;
        if deleted {
            self.gate.mark_not_initialized(&self.key);
        }
        Ok(deleted)
    }

    pub fn compatible_with_model(&self, throw_if_no_metadata: bool) -> Result<bool> {
        self.store
            .compatible_with_model(self.context.as_ref(), throw_if_no_metadata)
    }

    pub fn command_timeout(&self) -> Option<u64> {
        self.command_timeout
    }

    /// `None` means the provider default. Negative values are rejected.
    pub fn set_command_timeout(&mut self, secs: Option<i64>) -> Result<()> {
        self.command_timeout = match secs {
            Some(s) if s < 0 => return Err(DbError::InvalidCommandTimeout(s)),
            Some(s) => Some(s as u64),
            None => None,
        };
        Ok(())
    }
}
