#![forbid(unsafe_code)]
//! entiq-db: database lifecycle for entiq contexts.
//!
//! - `gate`: at-most-once initialization per (context type, model, connection).
//! - `initializer`: create/drop strategies and the seeding hook.
//! - `database`: the per-context facade (`initialize`, `create`, `delete`, ...).
//! - `store`, `memory`: the store operations consumed, and an in-memory store.

pub mod context;
pub mod database;
pub mod error;
pub mod gate;
pub mod initializer;
pub mod memory;
pub mod model;
pub mod store;

pub use context::{BasicContext, DbContext};
pub use database::Database;
pub use error::{DbError, Result};
pub use gate::{GateKey, GateState, InitializationGate};
pub use initializer::{
    CreateDatabaseIfNotExists, DatabaseInitializer, DropCreateDatabaseAlways,
    DropCreateDatabaseIfModelChanges, NoSeed, NullDatabaseInitializer, Seeder,
};
pub use memory::MemoryStore;
pub use model::{EntityDef, FieldDef, Model};
pub use store::{ModelCompatibility, Store, StoreOperations};
