//! Database lifecycle: gate transitions, strategies, store operations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use entiq_core::types::TypeRef;
use entiq_db::{
    BasicContext, CreateDatabaseIfNotExists, Database, DbContext, DbError, DropCreateDatabaseAlways,
    EntityDef, GateState, InitializationGate, MemoryStore, Model, Result, StoreOperations,
};

fn orders_model() -> Model {
    Model::new().entity(
        EntityDef::new("Order")
            .field("id", TypeRef::INT32)
            .field("total", TypeRef::DECIMAL),
    )
}

fn context(connection: &str) -> Arc<BasicContext> {
    Arc::new(BasicContext::new("OrdersContext", orders_model(), connection))
}

fn counting_seeder(count: &Arc<AtomicUsize>) -> impl Fn(&dyn DbContext) -> Result<()> + Send + Sync {
    let count = Arc::clone(count);
    move |_ctx: &dyn DbContext| -> Result<()> {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn initialize_seeds_once_and_force_reseeds() {
    let store = MemoryStore::new();
    let seeds = Arc::new(AtomicUsize::new(0));
    let db = Database::new(context("db1"), Arc::new(store.clone()))
        .unwrap()
        .with_gate(Arc::new(InitializationGate::new()))
        .with_initializer(Arc::new(CreateDatabaseIfNotExists::with_seeder(counting_seeder(
            &seeds,
        ))));

    assert_eq!(db.state(), GateState::Uninitialized);
    assert!(db.initialize(false).unwrap());
    assert_eq!(db.state(), GateState::Initialized);
    assert_eq!(seeds.load(Ordering::SeqCst), 1);

    assert!(!db.initialize(false).unwrap());
    assert_eq!(db.state(), GateState::Initialized);
    assert_eq!(seeds.load(Ordering::SeqCst), 1);

    // The store survives, so forcing re-runs the strategy but finds it present.
    assert!(db.initialize(true).unwrap());
    assert_eq!(seeds.load(Ordering::SeqCst), 1);
    assert_eq!(store.creates(), 1);
}

#[test]
fn forced_initialize_recovers_from_out_of_band_delete() {
    let store = MemoryStore::new();
    let seeds = Arc::new(AtomicUsize::new(0));
    let db = Database::new(context("db1"), Arc::new(store.clone()))
        .unwrap()
        .with_gate(Arc::new(InitializationGate::new()))
        .with_initializer(Arc::new(CreateDatabaseIfNotExists::with_seeder(counting_seeder(
            &seeds,
        ))));

    db.initialize(false).unwrap();
    store.delete_if_exists("db1").unwrap();
    assert!(!db.initialize(false).unwrap());
    assert!(!db.exists().unwrap());

    assert!(db.initialize(true).unwrap());
    assert!(db.exists().unwrap());
    assert_eq!(seeds.load(Ordering::SeqCst), 2);
}

#[test]
fn force_always_reruns_drop_create_seeding() {
    let store = MemoryStore::new();
    let seeds = Arc::new(AtomicUsize::new(0));
    let db = Database::new(context("db1"), Arc::new(store))
        .unwrap()
        .with_gate(Arc::new(InitializationGate::new()))
        .with_initializer(Arc::new(DropCreateDatabaseAlways::with_seeder(counting_seeder(
            &seeds,
        ))));
    db.initialize(false).unwrap();
    db.initialize(false).unwrap();
    assert_eq!(seeds.load(Ordering::SeqCst), 1);
    db.initialize(true).unwrap();
    assert_eq!(seeds.load(Ordering::SeqCst), 2);
}

#[test]
fn exists_and_delete_after_initialization() {
    let store = MemoryStore::new();
    let db = Database::new(context("db1"), Arc::new(store))
        .unwrap()
        .with_gate(Arc::new(InitializationGate::new()));
    db.initialize(false).unwrap();
    assert_eq!(db.state(), GateState::Initialized);

    assert!(db.exists().unwrap());
    assert!(db.delete().unwrap());
    assert!(!db.delete().unwrap());
    assert!(!db.exists().unwrap());
    assert_eq!(db.state(), GateState::Uninitialized);
}

#[test]
fn create_and_create_if_not_exists_differ_on_existing_store() {
    let store = MemoryStore::new();
    store.insert("db1", &orders_model()).unwrap();
    let db = Database::new(context("db1"), Arc::new(store.clone()))
        .unwrap()
        .with_gate(Arc::new(InitializationGate::new()));

    assert!(!db.create_if_not_exists().unwrap());
    let err = db.create().unwrap_err();
    assert!(matches!(err, DbError::AlreadyExists { .. }));
    assert!(err.to_string().contains("db1"));
    assert_eq!(store.creates(), 0);
}

#[test]
fn model_mismatch_names_the_context_and_leaves_store() {
    let store = MemoryStore::new();
    let old = Model::new().entity(EntityDef::new("Order").field("id", TypeRef::INT32));
    store.insert("db1", &old).unwrap();
    let db = Database::new(context("db1"), Arc::new(store.clone()))
        .unwrap()
        .with_gate(Arc::new(InitializationGate::new()));

    let err = db.initialize(false).unwrap_err();
    assert!(matches!(err, DbError::ModelMismatch { ref context } if context == "OrdersContext"));
    assert_eq!(db.state(), GateState::Uninitialized);
    assert!(store.exists("db1").unwrap());
    assert!(!db.compatible_with_model(true).unwrap());
}

#[test]
fn no_metadata_is_compatible_unless_asked_to_throw() {
    let store = MemoryStore::new();
    store.insert_without_metadata("legacy");
    let db = Database::new(context("legacy"), Arc::new(store.clone()))
        .unwrap()
        .with_gate(Arc::new(InitializationGate::new()));
    assert!(db.compatible_with_model(false).unwrap());
    assert!(matches!(
        db.compatible_with_model(true),
        Err(DbError::NoMetadata { .. })
    ));
    assert!(db.initialize(false).unwrap());
    assert_eq!(store.creates(), 0);
}

#[test]
fn concurrent_initialize_seeds_at_most_once() {
    InitializationGate::global().clear();
    let store = MemoryStore::new();
    let seeds = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = store.clone();
            let seeds = Arc::clone(&seeds);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let slow = move |_: &dyn DbContext| -> Result<()> {
                    thread::sleep(Duration::from_millis(20));
                    seeds.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                };
                let db = Database::new(context("shared"), Arc::new(store))
                    .unwrap()
                    .with_initializer(Arc::new(CreateDatabaseIfNotExists::with_seeder(slow)));
                barrier.wait();
                db.initialize(false).unwrap()
            })
        })
        .collect();

    let ran = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ran| *ran)
        .count();
    assert_eq!(ran, 1);
    assert_eq!(seeds.load(Ordering::SeqCst), 1);
    assert_eq!(store.creates(), 1);
}

#[test]
fn different_connections_initialize_independently() {
    let gate = Arc::new(InitializationGate::new());
    let store = MemoryStore::new();
    let a = Database::new(context("a"), Arc::new(store.clone()))
        .unwrap()
        .with_gate(Arc::clone(&gate));
    let b = Database::new(context("b"), Arc::new(store.clone()))
        .unwrap()
        .with_gate(gate);
    a.initialize(false).unwrap();
    assert_eq!(b.state(), GateState::Uninitialized);
    b.initialize(false).unwrap();
    assert_eq!(store.len(), 2);
}

#[test]
fn gate_runs_seed_routine_once_then_again_when_forced() {
    use entiq_core::hash::fingerprint_bytes;
    use entiq_db::GateKey;

    let gate = InitializationGate::new();
    let key = GateKey::new("OrdersContext", fingerprint_bytes(b"abc"), "db1");
    let seeds = AtomicUsize::new(0);
    let seed = || -> Result<()> {
        seeds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };

    assert_eq!(gate.state(&key), GateState::Uninitialized);
    gate.initialize(&key, false, seed).unwrap();
    assert_eq!(gate.state(&key), GateState::Initialized);
    assert_eq!(seeds.load(Ordering::SeqCst), 1);

    gate.initialize(&key, false, seed).unwrap();
    assert_eq!(gate.state(&key), GateState::Initialized);
    assert_eq!(seeds.load(Ordering::SeqCst), 1);

    gate.initialize(&key, true, seed).unwrap();
    assert_eq!(seeds.load(Ordering::SeqCst), 2);
}
