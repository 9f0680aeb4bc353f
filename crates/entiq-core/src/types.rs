//! Structural type references.
//!
//! A `TypeRef` describes the static type of an expression node or of a
//! declared operator parameter. Operator definitions are written over
//! `Generic(i)` placeholders and specialized by `substitute`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    String,
    Bytes,
    DateTime,
    DateTimeOffset,
    Time,
}

impl ScalarType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ScalarType::Int32
                | ScalarType::Int64
                | ScalarType::Float32
                | ScalarType::Float64
                | ScalarType::Decimal
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            ScalarType::DateTime | ScalarType::DateTimeOffset | ScalarType::Time
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "Bool",
            ScalarType::Int32 => "Int32",
            ScalarType::Int64 => "Int64",
            ScalarType::Float32 => "Float32",
            ScalarType::Float64 => "Float64",
            ScalarType::Decimal => "Decimal",
            ScalarType::String => "String",
            ScalarType::Bytes => "Bytes",
            ScalarType::DateTime => "DateTime",
            ScalarType::DateTimeOffset => "DateTimeOffset",
            ScalarType::Time => "Time",
        }
    }

    /// Parse the short names accepted by query descriptions (`int`, `i64`, `Decimal`, ...).
    pub fn parse(s: &str) -> Option<ScalarType> {
        let t = match s {
            "Bool" | "bool" | "Boolean" => ScalarType::Bool,
            "Int32" | "int" | "i32" => ScalarType::Int32,
            "Int64" | "long" | "i64" => ScalarType::Int64,
            "Float32" | "float" | "f32" => ScalarType::Float32,
            "Float64" | "double" | "f64" => ScalarType::Float64,
            "Decimal" | "decimal" => ScalarType::Decimal,
            "String" | "string" | "Utf8" => ScalarType::String,
            "Bytes" | "bytes" | "Binary" => ScalarType::Bytes,
            "DateTime" | "datetime" => ScalarType::DateTime,
            "DateTimeOffset" | "datetimeoffset" => ScalarType::DateTimeOffset,
            "Time" | "time" => ScalarType::Time,
            _ => return None,
        };
        Some(t)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    /// Placeholder for the i-th generic argument of an operator definition.
    Generic(u8),
    Scalar(ScalarType),
    Nullable(Box<TypeRef>),
    /// A provider-backed sequence whose operators are rewritten, not run.
    Queryable(Box<TypeRef>),
    /// An in-memory collection argument (canonical aggregate functions).
    Sequence(Box<TypeRef>),
    /// A quoted lambda: the provider receives the tree, not a callable.
    Expression(Box<TypeRef>),
    Func(Vec<TypeRef>, Box<TypeRef>),
    EqualityComparer(Box<TypeRef>),
    Entity(String),
}

impl TypeRef {
    pub const BOOL: TypeRef = TypeRef::Scalar(ScalarType::Bool);
    pub const INT32: TypeRef = TypeRef::Scalar(ScalarType::Int32);
    pub const INT64: TypeRef = TypeRef::Scalar(ScalarType::Int64);
    pub const FLOAT32: TypeRef = TypeRef::Scalar(ScalarType::Float32);
    pub const FLOAT64: TypeRef = TypeRef::Scalar(ScalarType::Float64);
    pub const DECIMAL: TypeRef = TypeRef::Scalar(ScalarType::Decimal);
    pub const STRING: TypeRef = TypeRef::Scalar(ScalarType::String);

    pub fn nullable(inner: TypeRef) -> TypeRef {
        match inner {
            n @ TypeRef::Nullable(_) => n,
            other => TypeRef::Nullable(Box::new(other)),
        }
    }

    pub fn queryable(element: TypeRef) -> TypeRef {
        TypeRef::Queryable(Box::new(element))
    }

    pub fn sequence(element: TypeRef) -> TypeRef {
        TypeRef::Sequence(Box::new(element))
    }

    pub fn expression(inner: TypeRef) -> TypeRef {
        TypeRef::Expression(Box::new(inner))
    }

    pub fn func(params: Vec<TypeRef>, ret: TypeRef) -> TypeRef {
        TypeRef::Func(params, Box::new(ret))
    }

    /// `Expression<Func<element, Bool>>`
    pub fn predicate(element: TypeRef) -> TypeRef {
        TypeRef::expression(TypeRef::func(vec![element], TypeRef::BOOL))
    }

    /// `Expression<Func<element, result>>`
    pub fn selector(element: TypeRef, result: TypeRef) -> TypeRef {
        TypeRef::expression(TypeRef::func(vec![element], result))
    }

    pub fn entity(name: impl Into<String>) -> TypeRef {
        TypeRef::Entity(name.into())
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeRef::Nullable(_))
    }

    /// Strip one level of nullability.
    pub fn underlying(&self) -> &TypeRef {
        match self {
            TypeRef::Nullable(inner) => inner,
            other => other,
        }
    }

    pub fn scalar(&self) -> Option<ScalarType> {
        match self.underlying() {
            TypeRef::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.scalar().map(ScalarType::is_numeric).unwrap_or(false)
    }

    /// Element type of a queryable or in-memory sequence.
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Queryable(e) | TypeRef::Sequence(e) => Some(e),
            _ => None,
        }
    }

    /// Return type of a `Func`, looking through one `Expression` wrapper.
    pub fn func_result(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Func(_, ret) => Some(ret),
            TypeRef::Expression(inner) => inner.func_result(),
            _ => None,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, TypeRef::Expression(_))
    }

    pub fn contains_generic(&self) -> bool {
        match self {
            TypeRef::Generic(_) => true,
            TypeRef::Scalar(_) | TypeRef::Entity(_) => false,
            TypeRef::Nullable(t)
            | TypeRef::Queryable(t)
            | TypeRef::Sequence(t)
            | TypeRef::Expression(t)
            | TypeRef::EqualityComparer(t) => t.contains_generic(),
            TypeRef::Func(params, ret) => {
                params.iter().any(TypeRef::contains_generic) || ret.contains_generic()
            }
        }
    }

    /// Replace every `Generic(i)` with `args[i]`.
    pub fn substitute(&self, args: &[TypeRef]) -> Result<TypeRef> {
        let out = match self {
            TypeRef::Generic(i) => args.get(*i as usize).cloned().ok_or_else(|| {
                Error::Type(format!(
                    "generic placeholder T{} has no argument ({} supplied)",
                    i,
                    args.len()
                ))
            })?,
            TypeRef::Scalar(_) | TypeRef::Entity(_) => self.clone(),
            TypeRef::Nullable(t) => TypeRef::nullable(t.substitute(args)?),
            TypeRef::Queryable(t) => TypeRef::Queryable(Box::new(t.substitute(args)?)),
            TypeRef::Sequence(t) => TypeRef::Sequence(Box::new(t.substitute(args)?)),
            TypeRef::Expression(t) => TypeRef::Expression(Box::new(t.substitute(args)?)),
            TypeRef::EqualityComparer(t) => {
                TypeRef::EqualityComparer(Box::new(t.substitute(args)?))
            }
            TypeRef::Func(params, ret) => TypeRef::Func(
                params
                    .iter()
                    .map(|p| p.substitute(args))
                    .collect::<Result<Vec<_>>>()?,
                Box::new(ret.substitute(args)?),
            ),
        };
        Ok(out)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Generic(i) => write!(f, "T{}", i),
            TypeRef::Scalar(s) => f.write_str(s.name()),
            TypeRef::Nullable(t) => write!(f, "{}?", t),
            TypeRef::Queryable(t) => write!(f, "Queryable<{}>", t),
            TypeRef::Sequence(t) => write!(f, "Sequence<{}>", t),
            TypeRef::Expression(t) => write!(f, "Expression<{}>", t),
            TypeRef::EqualityComparer(t) => write!(f, "EqualityComparer<{}>", t),
            TypeRef::Entity(name) => f.write_str(name),
            TypeRef::Func(params, ret) => {
                f.write_str("Func<")?;
                for p in params {
                    write!(f, "{}, ", p)?;
                }
                write!(f, "{}>", ret)
            }
        }
    }
}

/// Static mapping from a Rust type to the `TypeRef` used in expression trees.
///
/// Entity types implement this by hand, returning `TypeRef::Entity(..)`.
pub trait ElementType {
    fn type_ref() -> TypeRef;
}

macro_rules! scalar_element {
    ($($ty:ty => $scalar:ident),* $(,)?) => {
        $(
            impl ElementType for $ty {
                fn type_ref() -> TypeRef {
                    TypeRef::Scalar(ScalarType::$scalar)
                }
            }
        )*
    };
}

scalar_element! {
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    String => String,
    Vec<u8> => Bytes,
}

impl<T: ElementType> ElementType for Option<T> {
    fn type_ref() -> TypeRef {
        TypeRef::nullable(T::type_ref())
    }
}
