//! Tagged expression tree.
//!
//! Callers build predicates and selectors as `Expr` values; the operator
//! rewriter threads them into `Call` nodes and providers translate the
//! result. Nothing here evaluates a node.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::TypeRef;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn is_boolean(self) -> bool {
        !matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    pub fn parse(s: &str) -> Option<BinaryOp> {
        let op = match s {
            "eq" | "==" => BinaryOp::Eq,
            "ne" | "!=" => BinaryOp::Ne,
            "lt" | "<" => BinaryOp::Lt,
            "le" | "<=" => BinaryOp::Le,
            "gt" | ">" => BinaryOp::Gt,
            "ge" | ">=" => BinaryOp::Ge,
            "and" | "&&" => BinaryOp::And,
            "or" | "||" => BinaryOp::Or,
            "add" | "+" => BinaryOp::Add,
            "sub" | "-" => BinaryOp::Sub,
            "mul" | "*" => BinaryOp::Mul,
            "div" | "/" => BinaryOp::Div,
            _ => return None,
        };
        Some(op)
    }
}

/// A fully specialized operator method: no generic placeholders remain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub name: String,
    pub type_args: Vec<TypeRef>,
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.type_args.is_empty() {
            f.write_str("<")?;
            for (i, t) in self.type_args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", t)?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Constant {
        value: Value,
        ty: TypeRef,
    },
    Parameter(Param),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Member {
        target: Box<Expr>,
        member: String,
        ty: TypeRef,
    },
    Call {
        method: MethodRef,
        args: Vec<Expr>,
    },
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
    },
    /// A lambda passed as data; its type is `Expression<Func<..>>`.
    Quote(Box<Expr>),
    /// Root of a query: a named entity set or table.
    Source {
        name: String,
        ty: TypeRef,
    },
    /// Canonical store function, translated by the provider.
    Function {
        namespace: String,
        name: String,
        args: Vec<Expr>,
        ty: TypeRef,
    },
}

impl Expr {
    pub fn constant(value: impl Into<Value>, ty: TypeRef) -> Result<Expr> {
        let value = value.into();
        if !value.fits(&ty) {
            return Err(Error::Expr(format!(
                "constant {} does not fit type {}",
                value, ty
            )));
        }
        Ok(Expr::Constant { value, ty })
    }

    pub fn param(name: impl Into<String>, ty: TypeRef) -> Expr {
        Expr::Parameter(Param::new(name, ty))
    }

    pub fn member(target: Expr, member: impl Into<String>, ty: TypeRef) -> Expr {
        Expr::Member {
            target: Box::new(target),
            member: member.into(),
            ty,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equals(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, left, right)
    }

    /// Single-parameter lambda `param => body`.
    pub fn lambda(param: Param, body: Expr) -> Expr {
        Expr::Lambda {
            params: vec![param],
            body: Box::new(body),
        }
    }

    pub fn source(name: impl Into<String>, element: TypeRef) -> Expr {
        Expr::Source {
            name: name.into(),
            ty: TypeRef::queryable(element),
        }
    }

    /// Wrap a lambda so providers receive it as a tree. Already-quoted
    /// nodes are returned unchanged.
    pub fn quote(self) -> Expr {
        match self {
            q @ Expr::Quote(_) => q,
            other => Expr::Quote(Box::new(other)),
        }
    }

    pub fn is_lambda(&self) -> bool {
        matches!(self, Expr::Lambda { .. })
    }

    /// The lambda this node is or quotes.
    pub fn as_lambda(&self) -> Option<(&[Param], &Expr)> {
        match self {
            Expr::Lambda { params, body } => Some((params.as_slice(), &**body)),
            Expr::Quote(inner) => inner.as_lambda(),
            _ => None,
        }
    }

    /// Static type of this node.
    pub fn ty(&self) -> TypeRef {
        match self {
            Expr::Constant { ty, .. } => ty.clone(),
            Expr::Parameter(p) => p.ty.clone(),
            Expr::Binary { op, left, .. } => {
                if op.is_boolean() {
                    TypeRef::BOOL
                } else {
                    left.ty()
                }
            }
            Expr::Member { ty, .. } => ty.clone(),
            Expr::Call { method, .. } => method.ret.clone(),
            Expr::Lambda { params, body } => {
                TypeRef::func(params.iter().map(|p| p.ty.clone()).collect(), body.ty())
            }
            Expr::Quote(inner) => TypeRef::expression(inner.ty()),
            Expr::Source { ty, .. } => ty.clone(),
            Expr::Function { ty, .. } => ty.clone(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant { value, .. } => write!(f, "{}", value),
            Expr::Parameter(p) => f.write_str(&p.name),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Member { target, member, .. } => write!(f, "{}.{}", target, member),
            Expr::Call { method, args } => {
                write!(f, "{}(", method)?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Expr::Lambda { params, body } => {
                if let [p] = params.as_slice() {
                    write!(f, "{} => {}", p.name, body)
                } else {
                    f.write_str("(")?;
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        f.write_str(&p.name)?;
                    }
                    write!(f, ") => {}", body)
                }
            }
            Expr::Quote(inner) => write!(f, "'({})", inner),
            Expr::Source { name, .. } => f.write_str(name),
            Expr::Function {
                namespace,
                name,
                args,
                ..
            } => {
                write!(f, "{}.{}(", namespace, name)?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, e) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", e)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_over_100() -> Expr {
        let o = Param::new("o", TypeRef::entity("Order"));
        Expr::lambda(
            o.clone(),
            Expr::binary(
                BinaryOp::Gt,
                Expr::member(Expr::Parameter(o), "total", TypeRef::INT32),
                Expr::constant(100, TypeRef::INT32).unwrap(),
            ),
        )
    }

    #[test]
    fn lambda_type_is_func() {
        let l = total_over_100();
        assert_eq!(
            l.ty(),
            TypeRef::func(vec![TypeRef::entity("Order")], TypeRef::BOOL)
        );
        assert_eq!(
            l.clone().quote().ty(),
            TypeRef::predicate(TypeRef::entity("Order"))
        );
    }

    #[test]
    fn quote_is_idempotent() {
        let q = total_over_100().quote();
        assert_eq!(q.clone().quote(), q);
        assert!(q.as_lambda().is_some());
    }

    #[test]
    fn constant_checks_type() {
        assert!(Expr::constant(1i64, TypeRef::INT32).is_err());
        assert!(Expr::constant(Option::<i32>::None, TypeRef::nullable(TypeRef::INT32)).is_ok());
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(total_over_100().to_string(), "o => (o.total > 100)");
    }
}
