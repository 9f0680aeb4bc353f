//! Canonical store functions.
//!
//! Each builder returns an `Expr::Function` node in the `Edm` namespace for
//! the provider to translate. They check argument types and compute the
//! (nullable) result type; they never compute a value locally.

use std::fmt;

use entiq_core::expr::Expr;
use entiq_core::types::{ScalarType, TypeRef};

use crate::error::{OpError, Result};

pub const NAMESPACE: &str = "Edm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Years,
    Months,
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 9] = [
        TimeUnit::Years,
        TimeUnit::Months,
        TimeUnit::Days,
        TimeUnit::Hours,
        TimeUnit::Minutes,
        TimeUnit::Seconds,
        TimeUnit::Milliseconds,
        TimeUnit::Microseconds,
        TimeUnit::Nanoseconds,
    ];

    /// Calendar units have no meaning for a time-of-day value.
    fn applies_to(self, ty: ScalarType) -> bool {
        match ty {
            ScalarType::DateTime | ScalarType::DateTimeOffset => true,
            ScalarType::Time => !matches!(self, TimeUnit::Years | TimeUnit::Months | TimeUnit::Days),
            _ => false,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn function(name: impl Into<String>, args: Vec<Expr>, ty: TypeRef) -> Expr {
    Expr::Function {
        namespace: NAMESPACE.to_string(),
        name: name.into(),
        args,
        ty,
    }
}

fn reject(name: &str, reason: String) -> OpError {
    OpError::Function {
        name: name.to_string(),
        reason,
    }
}

/// Underlying scalar type of `arg` if it is one of `accepted`.
fn expect_scalar(name: &str, arg: &Expr, accepted: &[ScalarType]) -> Result<ScalarType> {
    let ty = arg.ty();
    match ty.scalar() {
        Some(s) if accepted.contains(&s) => Ok(s),
        _ => Err(reject(
            name,
            format!(
                "argument {} has type {}, expected one of {:?}",
                arg, ty, accepted
            ),
        )),
    }
}

fn nullable(s: ScalarType) -> TypeRef {
    TypeRef::nullable(TypeRef::Scalar(s))
}

const STAT_ELEMENTS: [ScalarType; 4] = [
    ScalarType::Int32,
    ScalarType::Int64,
    ScalarType::Float64,
    ScalarType::Decimal,
];

fn statistic(name: &str, collection: Expr) -> Result<Expr> {
    let ty = collection.ty();
    let ok = match &ty {
        TypeRef::Sequence(elem) => elem
            .scalar()
            .map(|s| STAT_ELEMENTS.contains(&s))
            .unwrap_or(false),
        _ => false,
    };
    if !ok {
        return Err(reject(
            name,
            format!("expected a numeric collection, got {}", ty),
        ));
    }
    Ok(function(name, vec![collection], nullable(ScalarType::Float64)))
}

pub fn standard_deviation(collection: Expr) -> Result<Expr> {
    statistic("StDev", collection)
}

pub fn standard_deviation_p(collection: Expr) -> Result<Expr> {
    statistic("StDevP", collection)
}

pub fn var(collection: Expr) -> Result<Expr> {
    statistic("Var", collection)
}

pub fn var_p(collection: Expr) -> Result<Expr> {
    statistic("VarP", collection)
}

fn string_with_length(name: &str, s: Expr, length: Expr) -> Result<Expr> {
    expect_scalar(name, &s, &[ScalarType::String])?;
    expect_scalar(name, &length, &[ScalarType::Int64, ScalarType::Int32])?;
    Ok(function(name, vec![s, length], TypeRef::STRING))
}

pub fn left(s: Expr, length: Expr) -> Result<Expr> {
    string_with_length("Left", s, length)
}

pub fn right(s: Expr, length: Expr) -> Result<Expr> {
    string_with_length("Right", s, length)
}

pub fn reverse(s: Expr) -> Result<Expr> {
    expect_scalar("Reverse", &s, &[ScalarType::String])?;
    Ok(function("Reverse", vec![s], TypeRef::STRING))
}

/// Marks a string constant or parameter as Unicode for the store.
pub fn as_unicode(s: Expr) -> Result<Expr> {
    expect_scalar("AsUnicode", &s, &[ScalarType::String])?;
    Ok(function("AsUnicode", vec![s], TypeRef::STRING))
}

pub fn as_non_unicode(s: Expr) -> Result<Expr> {
    expect_scalar("AsNonUnicode", &s, &[ScalarType::String])?;
    Ok(function("AsNonUnicode", vec![s], TypeRef::STRING))
}

pub fn truncate_time(value: Expr) -> Result<Expr> {
    let s = expect_scalar(
        "TruncateTime",
        &value,
        &[ScalarType::DateTime, ScalarType::DateTimeOffset],
    )?;
    Ok(function("TruncateTime", vec![value], nullable(s)))
}

pub fn create_date_time(
    year: Expr,
    month: Expr,
    day: Expr,
    hour: Expr,
    minute: Expr,
    second: Expr,
) -> Result<Expr> {
    let name = "CreateDateTime";
    for part in [&year, &month, &day, &hour, &minute] {
        expect_scalar(name, part, &[ScalarType::Int32])?;
    }
    expect_scalar(name, &second, &[ScalarType::Float64])?;
    Ok(function(
        name,
        vec![year, month, day, hour, minute, second],
        nullable(ScalarType::DateTime),
    ))
}

#[allow(clippy::too_many_arguments)]
pub fn create_date_time_offset(
    year: Expr,
    month: Expr,
    day: Expr,
    hour: Expr,
    minute: Expr,
    second: Expr,
    offset_minutes: Expr,
) -> Result<Expr> {
    let name = "CreateDateTimeOffset";
    for part in [&year, &month, &day, &hour, &minute, &offset_minutes] {
        expect_scalar(name, part, &[ScalarType::Int32])?;
    }
    expect_scalar(name, &second, &[ScalarType::Float64])?;
    Ok(function(
        name,
        vec![year, month, day, hour, minute, second, offset_minutes],
        nullable(ScalarType::DateTimeOffset),
    ))
}

pub fn create_time(hour: Expr, minute: Expr, second: Expr) -> Result<Expr> {
    let name = "CreateTime";
    expect_scalar(name, &hour, &[ScalarType::Int32])?;
    expect_scalar(name, &minute, &[ScalarType::Int32])?;
    expect_scalar(name, &second, &[ScalarType::Float64])?;
    Ok(function(name, vec![hour, minute, second], nullable(ScalarType::Time)))
}

const TEMPORAL: [ScalarType; 3] = [
    ScalarType::DateTime,
    ScalarType::DateTimeOffset,
    ScalarType::Time,
];

/// `Add{unit}(value, amount)`, keeping the value's temporal type.
pub fn add(unit: TimeUnit, value: Expr, amount: Expr) -> Result<Expr> {
    let name = format!("Add{}", unit);
    let s = expect_scalar(&name, &value, &TEMPORAL)?;
    if !unit.applies_to(s) {
        return Err(reject(&name, format!("{} cannot be added to {}", unit, s.name())));
    }
    expect_scalar(&name, &amount, &[ScalarType::Int32])?;
    Ok(function(name, vec![value, amount], nullable(s)))
}

/// `Diff{unit}(a, b)`; both operands must share a temporal type.
pub fn diff(unit: TimeUnit, a: Expr, b: Expr) -> Result<Expr> {
    let name = format!("Diff{}", unit);
    let sa = expect_scalar(&name, &a, &TEMPORAL)?;
    let sb = expect_scalar(&name, &b, &TEMPORAL)?;
    if sa != sb {
        return Err(reject(
            &name,
            format!("operands differ: {} vs {}", sa.name(), sb.name()),
        ));
    }
    if !unit.applies_to(sa) {
        return Err(reject(&name, format!("{} is undefined for {}", unit, sa.name())));
    }
    Ok(function(name, vec![a, b], nullable(ScalarType::Int32)))
}

pub fn get_total_offset_minutes(value: Expr) -> Result<Expr> {
    expect_scalar("GetTotalOffsetMinutes", &value, &[ScalarType::DateTimeOffset])?;
    Ok(function(
        "GetTotalOffsetMinutes",
        vec![value],
        nullable(ScalarType::Int32),
    ))
}

pub fn truncate(value: Expr, digits: Expr) -> Result<Expr> {
    let s = expect_scalar("Truncate", &value, &[ScalarType::Float64, ScalarType::Decimal])?;
    expect_scalar("Truncate", &digits, &[ScalarType::Int32])?;
    Ok(function("Truncate", vec![value, digits], nullable(s)))
}
