//! Runtime values exchanged with query providers.
//!
//! Providers hand results back as `Value`; callers convert them into Rust
//! types through `FromValue`. Constants embedded in expression trees are
//! also stored as `Value`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ScalarType, TypeRef};

/// Fixed-point decimal: `mantissa * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decimal {
    pub mantissa: i128,
    pub scale: u32,
}

impl Decimal {
    /// Largest scale a store decimal can carry.
    pub const MAX_SCALE: u32 = 28;

    pub const fn new(mantissa: i128, scale: u32) -> Self {
        Self { mantissa, scale }
    }

    /// Like `new`, but rejects scales above `MAX_SCALE`.
    pub fn try_new(mantissa: i128, scale: u32) -> Result<Self> {
        if scale > Self::MAX_SCALE {
            return Err(Error::Type(format!(
                "decimal scale {} exceeds maximum {}",
                scale,
                Self::MAX_SCALE
            )));
        }
        Ok(Self::new(mantissa, scale))
    }

    pub fn is_valid(self) -> bool {
        self.scale <= Self::MAX_SCALE
    }

    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let abs = self.mantissa.unsigned_abs();
        let Some(div) = 10u128.checked_pow(self.scale) else {
            return write!(f, "{}{}e-{}", sign, abs, self.scale);
        };
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / div,
            abs % div,
            width = self.scale as usize
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Record(Vec<(String, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Static type of a non-null scalar; `None` for null, lists and records.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        let t = match self {
            Value::Bool(_) => ScalarType::Bool,
            Value::I32(_) => ScalarType::Int32,
            Value::I64(_) => ScalarType::Int64,
            Value::F32(_) => ScalarType::Float32,
            Value::F64(_) => ScalarType::Float64,
            Value::Decimal(_) => ScalarType::Decimal,
            Value::Str(_) => ScalarType::String,
            Value::Bytes(_) => ScalarType::Bytes,
            Value::Null | Value::List(_) | Value::Record(_) => return None,
        };
        Some(t)
    }

    /// Whether this value may appear as a constant of type `ty`.
    pub fn fits(&self, ty: &TypeRef) -> bool {
        match (self, ty) {
            (Value::Null, TypeRef::Nullable(_)) | (Value::Null, TypeRef::Entity(_)) => true,
            (Value::Null, TypeRef::Scalar(ScalarType::String))
            | (Value::Null, TypeRef::Scalar(ScalarType::Bytes)) => true,
            (Value::Record(_), TypeRef::Entity(_)) => true,
            (Value::List(items), TypeRef::Sequence(elem)) => items.iter().all(|v| v.fits(elem)),
            (v, TypeRef::Nullable(inner)) => v.fits(inner),
            (Value::Decimal(d), TypeRef::Scalar(ScalarType::Decimal)) => d.is_valid(),
            (v, TypeRef::Scalar(s)) => v.scalar_type() == Some(*s),
            _ => false,
        }
    }

    /// Field lookup on a record value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::I32(_) => "I32",
            Value::I64(_) => "I64",
            Value::F32(_) => "F32",
            Value::F64(_) => "F64",
            Value::Decimal(_) => "Decimal",
            Value::Str(_) => "Str",
            Value::Bytes(_) => "Bytes",
            Value::List(_) => "List",
            Value::Record(_) => "Record",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}L", v),
            Value::F32(v) => write!(f, "{}f", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}m", d),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::Record(fields) => write!(f, "{{{} fields}}", fields.len()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    String => Str,
    Vec<u8> => Bytes,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Conversion from a provider result into a Rust value.
pub trait FromValue: Sized {
    fn from_value(v: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &str, got: &Value) -> Result<T> {
    Err(Error::Type(format!(
        "cannot convert {} value into {}",
        got.kind(),
        expected
    )))
}

impl FromValue for Value {
    fn from_value(v: Value) -> Result<Self> {
        Ok(v)
    }
}

impl FromValue for bool {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Bool(b) => Ok(b),
            other => mismatch("bool", &other),
        }
    }
}

impl FromValue for i32 {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::I32(x) => Ok(x),
            Value::I64(x) => i32::try_from(x)
                .map_err(|_| Error::Type(format!("{} does not fit in i32", x))),
            other => mismatch("i32", &other),
        }
    }
}

impl FromValue for i64 {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::I64(x) => Ok(x),
            Value::I32(x) => Ok(x as i64),
            other => mismatch("i64", &other),
        }
    }
}

impl FromValue for f32 {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::F32(x) => Ok(x),
            other => mismatch("f32", &other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::F64(x) => Ok(x),
            Value::F32(x) => Ok(x as f64),
            Value::I32(x) => Ok(x as f64),
            Value::I64(x) => Ok(x as f64),
            other => mismatch("f64", &other),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Decimal(d) => Ok(d),
            Value::I32(x) => Ok(Decimal::new(x as i128, 0)),
            Value::I64(x) => Ok(Decimal::new(x as i128, 0)),
            other => mismatch("Decimal", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Str(s) => Ok(s),
            other => mismatch("String", &other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Bytes(b) => Ok(b),
            other => mismatch("bytes", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
