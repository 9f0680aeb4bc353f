//! Once-per-key database initialization.
//!
//! Each (context type, model fingerprint, connection) key owns a slot with
//! its own state and condition variable. The slot lock is held only while
//! the state changes, never while the initialization routine runs; other
//! callers for the same key wait on the condition variable until the
//! running routine finishes. A routine that fails (or panics) leaves the
//! key `Uninitialized` so the next call retries.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

use entiq_core::hash::Fingerprint;

use crate::context::DbContext;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GateKey {
    context: String,
    model: Fingerprint,
    connection: String,
}

impl GateKey {
    pub fn new(context: impl Into<String>, model: Fingerprint, connection: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            model,
            connection: connection.into(),
        }
    }

    pub fn for_context(ctx: &dyn DbContext) -> Result<Self> {
        Ok(Self::new(
            ctx.context_type(),
            ctx.model().fingerprint()?,
            ctx.connection(),
        ))
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn model(&self) -> &Fingerprint {
        &self.model
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }
}

impl fmt::Display for GateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.context, self.model.short(), self.connection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Uninitialized,
    Initializing,
    Initialized,
}

#[derive(Debug)]
struct Slot {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Uninitialized),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until no routine is running for this slot.
    fn settled(&self) -> MutexGuard<'_, GateState> {
        let mut st = self.lock();
        while *st == GateState::Initializing {
            st = self.changed.wait(st).unwrap_or_else(PoisonError::into_inner);
        }
        st
    }
}

/// Resets the slot if the routine unwinds before completing.
struct Running<'a> {
    slot: &'a Slot,
    key: &'a GateKey,
    finished: bool,
}

impl Running<'_> {
    fn finish(mut self, to: GateState) {
        self.finished = true;
        self.set(to);
    }

    fn set(&self, to: GateState) {
        let mut st = self.slot.lock();
        transition(self.key, &mut st, to);
        self.slot.changed.notify_all();
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.set(GateState::Uninitialized);
        }
    }
}

fn transition(_key: &GateKey, st: &mut GateState, to: GateState) {
    #[cfg(feature = "tracing")]
    tracing::debug!(key = %_key, from = ?*st, to = ?to, "gate transition");
    *st = to;
}

#[derive(Debug, Default)]
pub struct InitializationGate {
    slots: Mutex<HashMap<GateKey, Arc<Slot>>>,
}

static GLOBAL: Lazy<Arc<InitializationGate>> = Lazy::new(|| Arc::new(InitializationGate::new()));

impl InitializationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide gate shared by every `Database` that was not given
    /// its own.
    pub fn global() -> Arc<InitializationGate> {
        Arc::clone(&GLOBAL)
    }

    fn slot(&self, key: &GateKey) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_insert_with(|| Arc::new(Slot::new())))
    }

    pub fn state(&self, key: &GateKey) -> GateState {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(key) {
            Some(slot) => *slot.lock(),
            None => GateState::Uninitialized,
        }
    }

    /// Run `routine` unless `key` is already initialized, or always when
    /// `force` is set. Returns whether the routine ran.
    ///
    /// Concurrent callers for the same key never run the routine at the same
    /// time: a caller that finds it running waits for the outcome, and then
    /// returns without running it again unless it asked for `force`.
    pub fn initialize<F>(&self, key: &GateKey, force: bool, routine: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        let slot = self.slot(key);
        {
            let mut st = slot.settled();
            if *st == GateState::Initialized && !force {
                return Ok(false);
            }
            if force && *st == GateState::Initialized {
                transition(key, &mut st, GateState::Uninitialized);
            }
            transition(key, &mut st, GateState::Initializing);
        }

        let running = Running {
            slot: &slot,
            key,
            finished: false,
        };
        match routine() {
            Ok(()) => {
                running.finish(GateState::Initialized);
                Ok(true)
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(key = %key, error = %e, "initialization failed; will retry");
                running.finish(GateState::Uninitialized);
                Err(e)
            }
        }
    }

    /// Record `key` as initialized without running anything.
    pub fn mark_initialized(&self, key: &GateKey) {
        let slot = self.slot(key);
        let mut st = slot.settled();
        transition(key, &mut st, GateState::Initialized);
    }

    /// Forget that `key` was initialized so the next `initialize` runs again.
    /// Ignored while a routine for `key` is running.
    pub fn mark_not_initialized(&self, key: &GateKey) {
        let slot = self.slot(key);
        let mut st = slot.lock();
        if *st == GateState::Initialized {
            transition(key, &mut st, GateState::Uninitialized);
        }
    }

    /// Drop every slot. Callers must ensure no routine is running.
    #[cfg(any(test, feature = "test-util"))]
    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
