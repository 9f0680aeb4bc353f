#![forbid(unsafe_code)]
//! entiq-operators: operator resolution and expression rewriting.
//!
//! Design intent:
//! - The operator catalog is an explicit table; nothing is discovered by
//!   introspection at runtime.
//! - `Registry` resolves each `OperatorKey` once and hands out shared
//!   templates; after population it is read-only.
//! - `rewrite` is pure: it builds a new `Call` node and never touches the
//!   sequence it was given.

pub mod catalog;
pub mod dsl;
pub mod error;
pub mod functions;
pub mod key;
pub mod matcher;
pub mod registry;
pub mod rewrite;
pub mod template;

pub use catalog::{MethodDef, Numeric};
pub use error::{OpError, Result};
pub use key::{OperatorId, OperatorKey, ParamKind};
pub use registry::Registry;
pub use rewrite::{rewrite, rewrite_with};
pub use template::OperatorTemplate;
