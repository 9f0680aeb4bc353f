//! Store operations consumed by the lifecycle layer.
//!
//! All calls are synchronous and may be slow. Nothing here is retried.

use crate::context::DbContext;
use crate::error::Result;
use crate::model::Model;

pub trait StoreOperations: Send + Sync {
    fn exists(&self, connection: &str) -> Result<bool>;

    /// Create the store and record `model`'s fingerprint as its metadata.
    fn create(&self, connection: &str, model: &Model) -> Result<()>;

    /// Returns `true` when a store was actually removed.
    fn delete_if_exists(&self, connection: &str) -> Result<bool>;
}

pub trait ModelCompatibility: Send + Sync {
    /// Whether the store was created for `ctx`'s model.
    ///
    /// With no recorded metadata this fails with `DbError::NoMetadata` when
    /// `throw_if_no_metadata` is set, and returns `true` otherwise.
    fn compatible_with_model(&self, ctx: &dyn DbContext, throw_if_no_metadata: bool) -> Result<bool>;
}

/// Everything the lifecycle layer needs from a backing store.
pub trait Store: StoreOperations + ModelCompatibility {}

impl<T: StoreOperations + ModelCompatibility> Store for T {}
