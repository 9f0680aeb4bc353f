#![forbid(unsafe_code)]
//! entiq-core: the shared vocabulary of the entiq crates.
//!
//! - `types`: structural type references with generic placeholders.
//! - `expr`: the tagged expression tree handed to query providers.
//! - `value`: runtime values coming back from providers.
//! - `config`, `hash`, `id`, `error`: ambient plumbing.
//!
//! Nothing in this crate evaluates expressions or performs I/O.

pub mod config;
pub mod error;
pub mod expr;
pub mod hash;
pub mod id;
pub mod prelude;
pub mod types;
pub mod value;
