#![forbid(unsafe_code)]
//! entiq: the public query and lifecycle layer.
//!
//! Re-exports the workspace crates under one roof:
//! - `core`: expression trees, type references, values, config.
//! - `operators`: operator catalog, registry, rewriter, canonical functions.
//! - `exec`: typed queries and async dispatch to providers.
//! - `db`: database lifecycle gate and initialization strategies.

pub use entiq_core as core;
pub use entiq_db as db;
pub use entiq_exec as exec;
pub use entiq_operators as operators;

pub use entiq_db::{Database, DbContext, DbError};
pub use entiq_exec::{CancellationToken, ExecError, Query, QueryProvider};
pub use entiq_operators::{functions, OpError, OperatorId, Registry};
