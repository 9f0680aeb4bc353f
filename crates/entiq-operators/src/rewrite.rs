//! Expression rewriter.
//!
//! Turns "apply operator X to this sequence" into a `Call` node whose first
//! argument is the sequence's existing expression. Lambda arguments are
//! quoted so the provider receives them as trees. The function is pure: the
//! template, the base expression and the registry are never modified.

use entiq_core::expr::Expr;
use entiq_core::types::TypeRef;

use crate::error::{OpError, Result};
use crate::template::OperatorTemplate;

/// Build `template<element[, result]>(base, extra...)`.
///
/// For arity-2 templates the second type argument is the result type of the
/// first lambda in `extra`; arity-0 templates take no type arguments.
pub fn rewrite(
    template: &OperatorTemplate,
    element: &TypeRef,
    base: Expr,
    extra: Vec<Expr>,
) -> Result<Expr> {
    let type_args = infer_type_args(template, element, &extra)?;
    rewrite_with(template, &type_args, base, extra)
}

/// Same as `rewrite` with explicit type arguments.
pub fn rewrite_with(
    template: &OperatorTemplate,
    type_args: &[TypeRef],
    base: Expr,
    extra: Vec<Expr>,
) -> Result<Expr> {
    let method = template.specialize(type_args)?;
    let name = method.name.clone();

    let expected = method.params.len();
    let got = extra.len() + 1;
    if got != expected {
        return Err(OpError::Arity {
            name,
            expected,
            got,
        });
    }

    let mut args = Vec::with_capacity(expected);
    for (arg, param) in std::iter::once(base).chain(extra).zip(&method.params) {
        let arg = if param.is_expression() {
            if arg.as_lambda().is_none() {
                return Err(OpError::Rewrite {
                    name,
                    reason: format!("parameter {} needs a lambda, got {}", param, arg),
                });
            }
            arg.quote()
        } else {
            arg
        };
        let actual = arg.ty();
        if &actual != param {
            return Err(OpError::Rewrite {
                name,
                reason: format!("argument {} has type {}, expected {}", arg, actual, param),
            });
        }
        args.push(arg);
    }

    Ok(Expr::Call { method, args })
}

fn infer_type_args(
    template: &OperatorTemplate,
    element: &TypeRef,
    extra: &[Expr],
) -> Result<Vec<TypeRef>> {
    match template.generic_arity() {
        0 => Ok(Vec::new()),
        1 => Ok(vec![element.clone()]),
        2 => {
            let result = extra
                .iter()
                .find_map(|e| e.as_lambda().map(|(_, body)| body.ty()))
                .ok_or_else(|| OpError::Rewrite {
                    name: template.name().to_string(),
                    reason: "no selector to infer the result type from".to_string(),
                })?;
            Ok(vec![element.clone(), result])
        }
        n => Err(OpError::Specialize {
            name: template.name().to_string(),
            reason: format!("unsupported generic arity {}", n),
        }),
    }
}
