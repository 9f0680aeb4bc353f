//! Database initialization strategies.
//!
//! A strategy runs inside the gate, at most once per key. Every strategy
//! that creates a store calls its seeder exactly once per creation and then
//! persists the seeded changes.

use std::sync::Arc;

use entiq_core::config::InitializerKind;

use crate::context::DbContext;
use crate::error::{DbError, Result};
use crate::store::{ModelCompatibility, Store, StoreOperations};

/// Hook run once per successful store creation.
pub trait Seeder: Send + Sync {
    fn seed(&self, _ctx: &dyn DbContext) -> Result<()> {
        Ok(())
    }
}

/// The default seeder: adds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSeed;

impl Seeder for NoSeed {}

impl<F> Seeder for F
where
    F: Fn(&dyn DbContext) -> Result<()> + Send + Sync,
{
    fn seed(&self, ctx: &dyn DbContext) -> Result<()> {
        self(ctx)
    }
}

pub trait DatabaseInitializer: Send + Sync {
    fn name(&self) -> &'static str;

    fn initialize_database(&self, ctx: &dyn DbContext, store: &dyn Store) -> Result<()>;
}

fn create_and_seed(ctx: &dyn DbContext, store: &dyn Store, seeder: &dyn Seeder) -> Result<()> {
    store.create(ctx.connection(), ctx.model())?;
    #[cfg(feature = "tracing")]
    tracing::debug!(context = ctx.context_type(), connection = ctx.connection(), "seeding new store");
    seeder.seed(ctx)?;
    ctx.save_changes()?;
    Ok(())
}

/// Creates the store when missing; otherwise checks that it matches the
/// model. A store without model metadata is assumed compatible.
#[derive(Debug, Clone, Default)]
pub struct CreateDatabaseIfNotExists<S = NoSeed> {
    seeder: S,
}

impl CreateDatabaseIfNotExists {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Seeder> CreateDatabaseIfNotExists<S> {
    pub fn with_seeder(seeder: S) -> Self {
        Self { seeder }
    }
}

impl<S: Seeder> DatabaseInitializer for CreateDatabaseIfNotExists<S> {
    fn name(&self) -> &'static str {
        "create_if_not_exists"
    }

    fn initialize_database(&self, ctx: &dyn DbContext, store: &dyn Store) -> Result<()> {
        if !store.exists(ctx.connection())? {
            return create_and_seed(ctx, store, &self.seeder);
        }
        match store.compatible_with_model(ctx, true) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DbError::ModelMismatch {
                context: ctx.context_type().to_string(),
            }),
            // Database-first and model-first stores carry no metadata.
            Err(DbError::NoMetadata { .. }) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    context = ctx.context_type(),
                    connection = ctx.connection(),
                    "store has no model metadata; assuming compatible"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Deletes and recreates the store on every initialization.
#[derive(Debug, Clone, Default)]
pub struct DropCreateDatabaseAlways<S = NoSeed> {
    seeder: S,
}

impl DropCreateDatabaseAlways {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Seeder> DropCreateDatabaseAlways<S> {
    pub fn with_seeder(seeder: S) -> Self {
        Self { seeder }
    }
}

impl<S: Seeder> DatabaseInitializer for DropCreateDatabaseAlways<S> {
    fn name(&self) -> &'static str {
        "drop_create_always"
    }

    fn initialize_database(&self, ctx: &dyn DbContext, store: &dyn Store) -> Result<()> {
        store.delete_if_exists(ctx.connection())?;
        create_and_seed(ctx, store, &self.seeder)
    }
}

/// Recreates the store only when its recorded model differs. A store
/// without metadata is an error here.
#[derive(Debug, Clone, Default)]
pub struct DropCreateDatabaseIfModelChanges<S = NoSeed> {
    seeder: S,
}

impl DropCreateDatabaseIfModelChanges {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Seeder> DropCreateDatabaseIfModelChanges<S> {
    pub fn with_seeder(seeder: S) -> Self {
        Self { seeder }
    }
}

impl<S: Seeder> DatabaseInitializer for DropCreateDatabaseIfModelChanges<S> {
    fn name(&self) -> &'static str {
        "drop_create_if_model_changes"
    }

    fn initialize_database(&self, ctx: &dyn DbContext, store: &dyn Store) -> Result<()> {
        if store.exists(ctx.connection())? {
            if store.compatible_with_model(ctx, true)? {
                return Ok(());
            }
            #[cfg(feature = "tracing")]
            tracing::info!(context = ctx.context_type(), "model changed; recreating store");
            store.delete_if_exists(ctx.connection())?;
        }
        create_and_seed(ctx, store, &self.seeder)
    }
}

/// Does nothing; the store is managed elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDatabaseInitializer;

impl DatabaseInitializer for NullDatabaseInitializer {
    fn name(&self) -> &'static str {
        "none"
    }

    fn initialize_database(&self, _ctx: &dyn DbContext, _store: &dyn Store) -> Result<()> {
        Ok(())
    }
}

/// The strategy named by configuration, with the default seeder.
pub fn from_kind(kind: InitializerKind) -> Arc<dyn DatabaseInitializer> {
    match kind {
        InitializerKind::CreateIfNotExists => Arc::new(CreateDatabaseIfNotExists::new()),
        InitializerKind::DropCreateAlways => Arc::new(DropCreateDatabaseAlways::new()),
        InitializerKind::DropCreateIfModelChanges => Arc::new(DropCreateDatabaseIfModelChanges::new()),
        InitializerKind::None => Arc::new(NullDatabaseInitializer),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::context::BasicContext;
    use crate::memory::MemoryStore;
    use crate::model::{EntityDef, Model};
    use entiq_core::types::TypeRef;

    fn ctx(ty: TypeRef) -> BasicContext {
        BasicContext::new(
            "OrdersContext",
            Model::new().entity(EntityDef::new("Order").field("id", ty)),
            "db1",
        )
    }

    struct Counting(AtomicUsize);

    impl Seeder for Counting {
        fn seed(&self, ctx: &dyn DbContext) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            assert_eq!(ctx.context_type(), "OrdersContext");
            Ok(())
        }
    }

    #[test]
    fn create_if_not_exists_seeds_new_store() {
        let store = MemoryStore::new();
        let c = ctx(TypeRef::INT32);
        c.stage(2);
        let init = CreateDatabaseIfNotExists::with_seeder(Counting(AtomicUsize::new(0)));
        init.initialize_database(&c, &store).unwrap();
        assert_eq!(init.seeder.0.load(Ordering::SeqCst), 1);
        assert_eq!(c.saved(), 2);
        assert_eq!(store.creates(), 1);

        init.initialize_database(&c, &store).unwrap();
        assert_eq!(init.seeder.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn create_if_not_exists_rejects_changed_model() {
        let store = MemoryStore::new();
        store.insert("db1", ctx(TypeRef::INT32).model()).unwrap();
        let err = CreateDatabaseIfNotExists::new()
            .initialize_database(&ctx(TypeRef::INT64), &store)
            .unwrap_err();
        assert!(matches!(err, DbError::ModelMismatch { ref context } if context == "OrdersContext"));
        assert!(err.to_string().contains("OrdersContext"));
        assert!(store.exists("db1").unwrap());
    }

    #[test]
    fn create_if_not_exists_accepts_store_without_metadata() {
        let store = MemoryStore::new();
        store.insert_without_metadata("db1");
        CreateDatabaseIfNotExists::new()
            .initialize_database(&ctx(TypeRef::INT32), &store)
            .unwrap();
        assert_eq!(store.creates(), 0);
    }

    #[test]
    fn drop_create_if_model_changes_recreates() {
        let store = MemoryStore::new();
        store.insert("db1", ctx(TypeRef::INT32).model()).unwrap();
        let init = DropCreateDatabaseIfModelChanges::new();
        init.initialize_database(&ctx(TypeRef::INT32), &store).unwrap();
        assert_eq!(store.creates(), 0);
        init.initialize_database(&ctx(TypeRef::INT64), &store).unwrap();
        assert_eq!((store.deletes(), store.creates()), (1, 1));

        store.insert_without_metadata("db1");
        assert!(matches!(
            init.initialize_database(&ctx(TypeRef::INT64), &store),
            Err(DbError::NoMetadata { .. })
        ));
    }

    #[test]
    fn drop_create_always_recreates_and_closure_seeds() {
        let store = MemoryStore::new();
        let seeded = AtomicUsize::new(0);
        let init = DropCreateDatabaseAlways::with_seeder(|_: &dyn DbContext| -> Result<()> {
            seeded.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        init.initialize_database(&ctx(TypeRef::INT32), &store).unwrap();
        init.initialize_database(&ctx(TypeRef::INT32), &store).unwrap();
        assert_eq!(seeded.load(Ordering::SeqCst), 2);
        assert_eq!((store.deletes(), store.creates()), (1, 2));
    }

    #[test]
    fn from_kind_maps_every_kind() {
        assert_eq!(from_kind(InitializerKind::CreateIfNotExists).name(), "create_if_not_exists");
        assert_eq!(from_kind(InitializerKind::DropCreateAlways).name(), "drop_create_always");
        assert_eq!(
            from_kind(InitializerKind::DropCreateIfModelChanges).name(),
            "drop_create_if_model_changes"
        );
        assert_eq!(from_kind(InitializerKind::None).name(), "none");
    }
}
