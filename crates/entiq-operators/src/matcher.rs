//! Method signature matcher.
//!
//! Finds the unique catalog definition for a name, a generic arity and a
//! parameter shape. The shape builder receives one `Generic(i)` placeholder
//! per generic parameter and returns the expected parameter types, which are
//! compared to each candidate's declared types in order.

use entiq_core::types::TypeRef;

use crate::catalog::{catalog, MethodDef};
use crate::error::{OpError, Result};
use crate::key::OperatorKey;

/// Resolve against the process catalog.
pub fn resolve<F>(name: &str, generic_arity: u8, shape: F) -> Result<&'static MethodDef>
where
    F: Fn(&[TypeRef]) -> Vec<TypeRef>,
{
    resolve_in(catalog(), name, generic_arity, shape)
}

pub fn resolve_key(key: &OperatorKey) -> Result<&'static MethodDef> {
    resolve(key.name(), key.arity(), key.shape_builder())
}

/// Resolve against an explicit list of definitions.
pub fn resolve_in<'c, F>(
    defs: &'c [MethodDef],
    name: &str,
    generic_arity: u8,
    shape: F,
) -> Result<&'c MethodDef>
where
    F: Fn(&[TypeRef]) -> Vec<TypeRef>,
{
    let placeholders: Vec<TypeRef> = (0..generic_arity).map(TypeRef::Generic).collect();
    let expected = shape(&placeholders);

    let mut found = defs
        .iter()
        .filter(|d| d.name == name && d.generic_arity == generic_arity)
        .filter(|d| d.params == expected);

    match (found.next(), found.next()) {
        (Some(def), None) => Ok(def),
        (first, second) => {
            let count = first.iter().count() + second.iter().count() + found.count();
            #[cfg(feature = "tracing")]
            tracing::warn!(name, generic_arity, candidates = count, "operator signature did not resolve");
            Err(OpError::Resolution {
                name: name.to_string(),
                arity: generic_arity,
                shape: render(&expected),
                found: count,
            })
        }
    }
}

fn render(types: &[TypeRef]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
