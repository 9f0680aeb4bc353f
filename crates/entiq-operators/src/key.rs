//! Operator identities and registry keys.

use std::fmt;

use entiq_core::types::TypeRef;

use crate::catalog::Numeric;

/// Kind tag for one declared parameter, materialized against generic placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// `Queryable<T0>`
    SequenceOfT,
    /// `Queryable<X>` for a concrete element type (e.g. `Sum` over `Int32?`).
    SequenceOfUnparameterizedElement(TypeRef),
    /// `Expression<Func<T0, Bool>>`
    PredicateExpr,
    /// `Expression<Func<T0, T1>>`
    SelectorExpr,
    /// `Expression<Func<T0, X>>` for a concrete result type.
    SelectorExprTo(TypeRef),
    /// A value of the element type, `T0`.
    ScalarValue,
    /// A constant of a fixed type (e.g. the `Int32` count of `Take`).
    ScalarOf(TypeRef),
    /// `EqualityComparer<T0>`
    EqualityComparer,
}

impl ParamKind {
    /// Parameter type for this kind given the definition's generic arguments.
    ///
    /// Kinds referring to `T1` only appear in arity-2 shapes; with fewer
    /// arguments the placeholder itself is kept so the comparison fails.
    pub fn materialize(&self, generics: &[TypeRef]) -> TypeRef {
        let t = |i: usize| {
            generics
                .get(i)
                .cloned()
                .unwrap_or(TypeRef::Generic(i as u8))
        };
        match self {
            ParamKind::SequenceOfT => TypeRef::queryable(t(0)),
            ParamKind::SequenceOfUnparameterizedElement(e) => TypeRef::queryable(e.clone()),
            ParamKind::PredicateExpr => TypeRef::predicate(t(0)),
            ParamKind::SelectorExpr => TypeRef::selector(t(0), t(1)),
            ParamKind::SelectorExprTo(r) => TypeRef::selector(t(0), r.clone()),
            ParamKind::ScalarValue => t(0),
            ParamKind::ScalarOf(ty) => ty.clone(),
            ParamKind::EqualityComparer => TypeRef::EqualityComparer(Box::new(t(0))),
        }
    }
}

/// Registry key: operator name, generic arity and ordered parameter shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperatorKey {
    name: &'static str,
    arity: u8,
    shape: Vec<ParamKind>,
}

impl OperatorKey {
    pub fn new(name: &'static str, arity: u8, shape: Vec<ParamKind>) -> Self {
        Self { name, arity, shape }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> u8 {
        self.arity
    }

    pub fn shape(&self) -> &[ParamKind] {
        &self.shape
    }

    /// Parameter-shape builder handed to the matcher.
    pub fn shape_builder(&self) -> impl Fn(&[TypeRef]) -> Vec<TypeRef> + '_ {
        move |generics| self.shape.iter().map(|k| k.materialize(generics)).collect()
    }
}

impl fmt::Display for OperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}`{}(", self.name, self.arity)?;
        let placeholders: Vec<TypeRef> = (0..self.arity).map(TypeRef::Generic).collect();
        for (i, k) in self.shape.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", k.materialize(&placeholders))?;
        }
        f.write_str(")")
    }
}

/// Every operator the dispatcher and the query builder can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorId {
    First,
    FirstWhere,
    FirstOrDefault,
    FirstOrDefaultWhere,
    Single,
    SingleWhere,
    SingleOrDefault,
    SingleOrDefaultWhere,
    Contains,
    Any,
    AnyWhere,
    All,
    Count,
    CountWhere,
    LongCount,
    LongCountWhere,
    Min,
    MinBy,
    Max,
    MaxBy,
    Sum(Numeric),
    SumBy(Numeric),
    Average(Numeric),
    AverageBy(Numeric),
    Where,
    Select,
    OrderBy,
    OrderByDescending,
    Take,
    Skip,
}

impl OperatorId {
    /// Operators executed through the async dispatcher.
    pub fn terminal() -> Vec<OperatorId> {
        use OperatorId::*;
        let mut ids = vec![
            First,
            FirstWhere,
            FirstOrDefault,
            FirstOrDefaultWhere,
            Single,
            SingleWhere,
            SingleOrDefault,
            SingleOrDefaultWhere,
            Contains,
            Any,
            AnyWhere,
            All,
            Count,
            CountWhere,
            LongCount,
            LongCountWhere,
            Min,
            MinBy,
            Max,
            MaxBy,
        ];
        for n in Numeric::ALL {
            ids.extend([Sum(n), SumBy(n), Average(n), AverageBy(n)]);
        }
        ids
    }

    /// Operators that build a new query without executing it.
    pub fn composition() -> Vec<OperatorId> {
        use OperatorId::*;
        vec![Where, Select, OrderBy, OrderByDescending, Take, Skip]
    }

    pub fn all() -> Vec<OperatorId> {
        let mut ids = Self::terminal();
        ids.extend(Self::composition());
        ids
    }

    pub fn name(self) -> &'static str {
        use OperatorId::*;
        match self {
            First | FirstWhere => "First",
            FirstOrDefault | FirstOrDefaultWhere => "FirstOrDefault",
            Single | SingleWhere => "Single",
            SingleOrDefault | SingleOrDefaultWhere => "SingleOrDefault",
            Contains => "Contains",
            Any | AnyWhere => "Any",
            All => "All",
            Count | CountWhere => "Count",
            LongCount | LongCountWhere => "LongCount",
            Min | MinBy => "Min",
            Max | MaxBy => "Max",
            Sum(_) | SumBy(_) => "Sum",
            Average(_) | AverageBy(_) => "Average",
            Where => "Where",
            Select => "Select",
            OrderBy => "OrderBy",
            OrderByDescending => "OrderByDescending",
            Take => "Take",
            Skip => "Skip",
        }
    }

    pub fn key(self) -> OperatorKey {
        use OperatorId::*;
        use ParamKind::*;
        let (arity, shape) = match self {
            First | FirstOrDefault | Single | SingleOrDefault | Any | Count | LongCount | Min
            | Max => (1, vec![SequenceOfT]),
            FirstWhere | FirstOrDefaultWhere | SingleWhere | SingleOrDefaultWhere | AnyWhere
            | All | CountWhere | LongCountWhere | Where => (1, vec![SequenceOfT, PredicateExpr]),
            Contains => (1, vec![SequenceOfT, ScalarValue]),
            MinBy | MaxBy | Select | OrderBy | OrderByDescending => {
                (2, vec![SequenceOfT, SelectorExpr])
            }
            Sum(n) | Average(n) => (0, vec![SequenceOfUnparameterizedElement(n.type_ref())]),
            SumBy(n) | AverageBy(n) => (1, vec![SequenceOfT, SelectorExprTo(n.type_ref())]),
            Take | Skip => (1, vec![SequenceOfT, ScalarOf(TypeRef::INT32)]),
        };
        OperatorKey::new(self.name(), arity, shape)
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
