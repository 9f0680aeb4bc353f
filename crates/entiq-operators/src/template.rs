//! Resolved operator templates.

use std::fmt;

use entiq_core::expr::MethodRef;
use entiq_core::id::TemplateId;
use entiq_core::types::TypeRef;

use crate::catalog::MethodDef;
use crate::error::{OpError, Result};
use crate::key::OperatorKey;

/// A catalog definition bound to the key it was resolved for.
///
/// Owned by the `Registry` behind an `Arc` and never mutated; callers
/// specialize it per call without touching the shared instance.
#[derive(Debug)]
pub struct OperatorTemplate {
    id: TemplateId,
    key: OperatorKey,
    def: &'static MethodDef,
}

impl OperatorTemplate {
    pub(crate) fn new(id: TemplateId, key: OperatorKey, def: &'static MethodDef) -> Self {
        Self { id, key, def }
    }

    pub fn id(&self) -> TemplateId {
        self.id
    }

    pub fn key(&self) -> &OperatorKey {
        &self.key
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn generic_arity(&self) -> u8 {
        self.def.generic_arity
    }

    pub fn definition(&self) -> &'static MethodDef {
        self.def
    }

    /// Bind the generic parameters to concrete types.
    pub fn specialize(&self, type_args: &[TypeRef]) -> Result<MethodRef> {
        if type_args.len() != self.def.generic_arity as usize {
            return Err(OpError::Specialize {
                name: self.def.name.to_string(),
                reason: format!(
                    "expected {} type arguments, got {}",
                    self.def.generic_arity,
                    type_args.len()
                ),
            });
        }
        if let Some(open) = type_args.iter().find(|t| t.contains_generic()) {
            return Err(OpError::Specialize {
                name: self.def.name.to_string(),
                reason: format!("type argument {} is not concrete", open),
            });
        }
        let params = self
            .def
            .params
            .iter()
            .map(|p| p.substitute(type_args))
            .collect::<entiq_core::error::Result<Vec<_>>>()?;
        Ok(MethodRef {
            name: self.def.name.to_string(),
            type_args: type_args.to_vec(),
            params,
            ret: self.def.ret.substitute(type_args)?,
        })
    }
}

impl fmt::Display for OperatorTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::OperatorId;
    use crate::matcher::resolve_key;

    fn template(id: OperatorId) -> OperatorTemplate {
        let key = id.key();
        let def = resolve_key(&key).unwrap();
        OperatorTemplate::new(TemplateId::from_raw(1), key, def)
    }

    #[test]
    fn specialize_substitutes_params_and_return() {
        let t = template(OperatorId::MaxBy);
        let m = t
            .specialize(&[TypeRef::entity("Order"), TypeRef::DECIMAL])
            .unwrap();
        assert_eq!(m.to_string(), "Max<Order, Decimal>");
        assert_eq!(m.ret, TypeRef::DECIMAL);
        assert_eq!(
            m.params[1],
            TypeRef::selector(TypeRef::entity("Order"), TypeRef::DECIMAL)
        );
    }

    #[test]
    fn specialize_checks_argument_count() {
        let t = template(OperatorId::Count);
        assert!(matches!(
            t.specialize(&[]),
            Err(OpError::Specialize { .. })
        ));
        assert!(t.specialize(&[TypeRef::Generic(0)]).is_err());
    }
}
