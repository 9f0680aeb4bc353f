//! The fixed table of sequence-operator definitions.
//!
//! Every definition is registered here explicitly; nothing is discovered at
//! runtime. Parameter types are written over `Generic(i)` placeholders and
//! compared structurally by the matcher. Several names carry more than one
//! overload (`Contains` with a comparer, indexed `Where`, nullable `Sum`
//! variants, ...), so name alone never identifies a definition.

use std::fmt;

use once_cell::sync::Lazy;

use entiq_core::types::{ScalarType, TypeRef};

/// A generic operator definition as declared in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub name: &'static str,
    pub generic_arity: u8,
    pub params: Vec<TypeRef>,
    pub ret: TypeRef,
}

impl fmt::Display for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        if self.generic_arity > 0 {
            f.write_str("<")?;
            for i in 0..self.generic_arity {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "T{}", i)?;
            }
            f.write_str(">")?;
        }
        f.write_str("(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// Numeric element types accepted by `Sum` and `Average`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Numeric {
    Int32,
    NullableInt32,
    Int64,
    NullableInt64,
    Float32,
    NullableFloat32,
    Float64,
    NullableFloat64,
    Decimal,
    NullableDecimal,
}

impl Numeric {
    pub const ALL: [Numeric; 10] = [
        Numeric::Int32,
        Numeric::NullableInt32,
        Numeric::Int64,
        Numeric::NullableInt64,
        Numeric::Float32,
        Numeric::NullableFloat32,
        Numeric::Float64,
        Numeric::NullableFloat64,
        Numeric::Decimal,
        Numeric::NullableDecimal,
    ];

    fn base(self) -> ScalarType {
        match self {
            Numeric::Int32 | Numeric::NullableInt32 => ScalarType::Int32,
            Numeric::Int64 | Numeric::NullableInt64 => ScalarType::Int64,
            Numeric::Float32 | Numeric::NullableFloat32 => ScalarType::Float32,
            Numeric::Float64 | Numeric::NullableFloat64 => ScalarType::Float64,
            Numeric::Decimal | Numeric::NullableDecimal => ScalarType::Decimal,
        }
    }

    pub fn is_nullable(self) -> bool {
        matches!(
            self,
            Numeric::NullableInt32
                | Numeric::NullableInt64
                | Numeric::NullableFloat32
                | Numeric::NullableFloat64
                | Numeric::NullableDecimal
        )
    }

    fn lift(self, scalar: ScalarType) -> TypeRef {
        if self.is_nullable() {
            TypeRef::nullable(TypeRef::Scalar(scalar))
        } else {
            TypeRef::Scalar(scalar)
        }
    }

    pub fn type_ref(self) -> TypeRef {
        self.lift(self.base())
    }

    /// Result type of `Sum` over this element type.
    pub fn sum_result(self) -> TypeRef {
        self.type_ref()
    }

    /// Result type of `Average`: integers average to Float64, the rest keep their type.
    pub fn average_result(self) -> TypeRef {
        match self.base() {
            ScalarType::Int32 | ScalarType::Int64 => self.lift(ScalarType::Float64),
            other => self.lift(other),
        }
    }

    pub fn from_type_ref(ty: &TypeRef) -> Option<Numeric> {
        Numeric::ALL.into_iter().find(|n| &n.type_ref() == ty)
    }
}

const T0: TypeRef = TypeRef::Generic(0);
const T1: TypeRef = TypeRef::Generic(1);

fn def(name: &'static str, generic_arity: u8, params: Vec<TypeRef>, ret: TypeRef) -> MethodDef {
    MethodDef {
        name,
        generic_arity,
        params,
        ret,
    }
}

fn seq(t: TypeRef) -> TypeRef {
    TypeRef::queryable(t)
}

fn build_catalog() -> Vec<MethodDef> {
    let mut c = Vec::with_capacity(96);

    // Element operators, each with and without a predicate.
    for name in ["First", "FirstOrDefault", "Single", "SingleOrDefault"] {
        c.push(def(name, 1, vec![seq(T0)], T0));
        c.push(def(name, 1, vec![seq(T0), TypeRef::predicate(T0)], T0));
    }

    c.push(def("Contains", 1, vec![seq(T0), T0], TypeRef::BOOL));
    c.push(def(
        "Contains",
        1,
        vec![seq(T0), T0, TypeRef::EqualityComparer(Box::new(T0))],
        TypeRef::BOOL,
    ));

    c.push(def("Any", 1, vec![seq(T0)], TypeRef::BOOL));
    c.push(def("Any", 1, vec![seq(T0), TypeRef::predicate(T0)], TypeRef::BOOL));
    c.push(def("All", 1, vec![seq(T0), TypeRef::predicate(T0)], TypeRef::BOOL));

    for (name, ret) in [("Count", TypeRef::INT32), ("LongCount", TypeRef::INT64)] {
        c.push(def(name, 1, vec![seq(T0)], ret.clone()));
        c.push(def(name, 1, vec![seq(T0), TypeRef::predicate(T0)], ret));
    }

    for name in ["Min", "Max"] {
        c.push(def(name, 1, vec![seq(T0)], T0));
        c.push(def(name, 2, vec![seq(T0), TypeRef::selector(T0, T1)], T1));
    }

    for n in Numeric::ALL {
        c.push(def("Sum", 0, vec![seq(n.type_ref())], n.sum_result()));
        c.push(def(
            "Sum",
            1,
            vec![seq(T0), TypeRef::selector(T0, n.type_ref())],
            n.sum_result(),
        ));
        c.push(def("Average", 0, vec![seq(n.type_ref())], n.average_result()));
        c.push(def(
            "Average",
            1,
            vec![seq(T0), TypeRef::selector(T0, n.type_ref())],
            n.average_result(),
        ));
    }

    // Composition operators return a new sequence.
    c.push(def("Where", 1, vec![seq(T0), TypeRef::predicate(T0)], seq(T0)));
    c.push(def(
        "Where",
        1,
        vec![
            seq(T0),
            TypeRef::expression(TypeRef::func(vec![T0, TypeRef::INT32], TypeRef::BOOL)),
        ],
        seq(T0),
    ));
    c.push(def("Select", 2, vec![seq(T0), TypeRef::selector(T0, T1)], seq(T1)));
    c.push(def("OrderBy", 2, vec![seq(T0), TypeRef::selector(T0, T1)], seq(T0)));
    c.push(def(
        "OrderByDescending",
        2,
        vec![seq(T0), TypeRef::selector(T0, T1)],
        seq(T0),
    ));
    c.push(def("Take", 1, vec![seq(T0), TypeRef::INT32], seq(T0)));
    c.push(def("Skip", 1, vec![seq(T0), TypeRef::INT32], seq(T0)));
    c.push(def("Distinct", 1, vec![seq(T0)], seq(T0)));

    c
}

static CATALOG: Lazy<Vec<MethodDef>> = Lazy::new(build_catalog);

/// All operator definitions known to the process.
pub fn catalog() -> &'static [MethodDef] {
    &CATALOG
}
