//! Convenient re-exports for downstream crates.

pub use crate::config::{EntiqConfig, InitializerKind};
pub use crate::error::{Error, Result};
pub use crate::expr::{BinaryOp, Expr, MethodRef, Param};
pub use crate::hash::Fingerprint;
pub use crate::id::{IdSequence, SubmissionId, TemplateId};
pub use crate::types::{ElementType, ScalarType, TypeRef};
pub use crate::value::{Decimal, FromValue, Value};
