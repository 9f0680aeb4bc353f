//! Minimal YAML query description → rewritten call tree.
//!
//! Example:
//! ```yaml
//! source:
//!   name: orders
//!   entity: Order
//!   fields:
//!     - { name: status, type: string }
//!     - { name: total,  type: decimal }
//! steps:
//!   - { op: where, member: status, cmp: eq, value: "open" }
//!   - { op: order_by, member: total, descending: true }
//!   - { op: take, count: 10 }
//! terminal: { op: sum, member: total }
//! ```

use serde::{Deserialize, Serialize};

use entiq_core::expr::{BinaryOp, Expr, Param};
use entiq_core::types::{ScalarType, TypeRef};
use entiq_core::value::{Decimal, Value};

use crate::catalog::Numeric;
use crate::error::{OpError, Result};
use crate::key::OperatorId;
use crate::registry::Registry;
use crate::rewrite::rewrite;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDoc {
    pub source: SourceDef,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub terminal: Option<Terminal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDef {
    pub name: String,
    pub entity: String,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Step {
    Where {
        member: String,
        cmp: String,
        value: serde_yaml::Value,
    },
    OrderBy {
        member: String,
        #[serde(default)]
        descending: bool,
    },
    Take {
        count: i32,
    },
    Skip {
        count: i32,
    },
}

/// Final operator; `member` selects a field for aggregates, `filter`
/// supplies a predicate for the operators that take one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terminal {
    pub op: String,
    #[serde(default)]
    pub member: Option<String>,
    #[serde(default)]
    pub filter: Option<FilterDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDef {
    pub member: String,
    pub cmp: String,
    pub value: serde_yaml::Value,
}

pub fn parse_yaml_query(src: &str) -> Result<QueryDoc> {
    Ok(serde_yaml::from_str(src)?)
}

fn parse_type(f: &FieldDef) -> Result<TypeRef> {
    let scalar = ScalarType::parse(&f.data_type)
        .ok_or_else(|| OpError::Dsl(format!("unknown type '{}' for field '{}'", f.data_type, f.name)))?;
    let ty = TypeRef::Scalar(scalar);
    Ok(if f.nullable { TypeRef::nullable(ty) } else { ty })
}

fn yaml_to_value(v: &serde_yaml::Value, ty: &TypeRef) -> Result<Value> {
    use serde_yaml::Value as Y;
    if let Y::Null = v {
        return Ok(Value::Null);
    }
    let bad = || OpError::Dsl(format!("value {:?} does not fit {}", v, ty));
    let out = match (ty.scalar(), v) {
        (Some(ScalarType::Bool), Y::Bool(b)) => Value::Bool(*b),
        (Some(ScalarType::Int32), Y::Number(n)) => {
            Value::I32(n.as_i64().and_then(|x| i32::try_from(x).ok()).ok_or_else(bad)?)
        }
        (Some(ScalarType::Int64), Y::Number(n)) => Value::I64(n.as_i64().ok_or_else(bad)?),
        (Some(ScalarType::Float32), Y::Number(n)) => Value::F32(n.as_f64().ok_or_else(bad)? as f32),
        (Some(ScalarType::Float64), Y::Number(n)) => Value::F64(n.as_f64().ok_or_else(bad)?),
        (Some(ScalarType::Decimal), Y::Number(n)) => Value::Decimal(parse_decimal(&n.to_string())?),
        (Some(ScalarType::Decimal), Y::String(s)) => Value::Decimal(parse_decimal(s)?),
        (Some(ScalarType::String), Y::String(s)) => Value::Str(s.clone()),
        _ => return Err(bad()),
    };
    Ok(out)
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    let s = s.trim();
    let bad = || OpError::Dsl(format!("'{}' is not a decimal", s));
    let (int, frac) = s.split_once('.').unwrap_or((s, ""));
    if int.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    if frac.len() > Decimal::MAX_SCALE as usize {
        return Err(OpError::Dsl(format!(
            "'{}' has {} fractional digits, at most {} are allowed",
            s,
            frac.len(),
            Decimal::MAX_SCALE
        )));
    }
    let mantissa = format!("{}{}", int, frac).parse::<i128>().map_err(|_| bad())?;
    Ok(Decimal::new(mantissa, frac.len() as u32))
}

/// Lowers a `QueryDoc` into a call tree through a registry.
pub struct QueryBuilder<'r> {
    registry: &'r Registry,
    element: TypeRef,
    fields: Vec<(String, TypeRef)>,
}

impl<'r> QueryBuilder<'r> {
    pub fn new(registry: &'r Registry, source: &SourceDef) -> Result<Self> {
        let fields = source
            .fields
            .iter()
            .map(|f| Ok((f.name.clone(), parse_type(f)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            registry,
            element: TypeRef::entity(source.entity.clone()),
            fields,
        })
    }

    fn field_type(&self, member: &str) -> Result<TypeRef> {
        self.fields
            .iter()
            .find(|(n, _)| n == member)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| OpError::Dsl(format!("unknown member '{}'", member)))
    }

    fn row(&self) -> Param {
        Param::new("x", self.element.clone())
    }

    fn selector(&self, member: &str) -> Result<Expr> {
        let p = self.row();
        let ty = self.field_type(member)?;
        Ok(Expr::lambda(p.clone(), Expr::member(Expr::Parameter(p), member, ty)))
    }

    fn predicate(&self, member: &str, cmp: &str, value: &serde_yaml::Value) -> Result<Expr> {
        let op = BinaryOp::parse(cmp)
            .filter(|op| op.is_boolean())
            .ok_or_else(|| OpError::Dsl(format!("unknown comparison '{}'", cmp)))?;
        let p = self.row();
        let ty = self.field_type(member)?;
        let constant = Expr::constant(yaml_to_value(value, &ty)?, ty.clone())?;
        Ok(Expr::lambda(
            p.clone(),
            Expr::binary(op, Expr::member(Expr::Parameter(p), member, ty), constant),
        ))
    }

    fn apply(&self, id: OperatorId, base: Expr, extra: Vec<Expr>) -> Result<Expr> {
        let template = self.registry.template(id)?;
        rewrite(&template, &self.element, base, extra)
    }

    pub fn build(&self, doc: &QueryDoc) -> Result<Expr> {
        let mut expr = Expr::source(doc.source.name.clone(), self.element.clone());
        for step in &doc.steps {
            expr = match step {
                Step::Where { member, cmp, value } => {
                    let pred = self.predicate(member, cmp, value)?;
                    self.apply(OperatorId::Where, expr, vec![pred])?
                }
                Step::OrderBy { member, descending } => {
                    let id = if *descending {
                        OperatorId::OrderByDescending
                    } else {
                        OperatorId::OrderBy
                    };
                    self.apply(id, expr, vec![self.selector(member)?])?
                }
                Step::Take { count } => {
                    self.apply(OperatorId::Take, expr, vec![Expr::constant(*count, TypeRef::INT32)?])?
                }
                Step::Skip { count } => {
                    self.apply(OperatorId::Skip, expr, vec![Expr::constant(*count, TypeRef::INT32)?])?
                }
            };
        }
        match &doc.terminal {
            Some(t) => self.terminal(t, expr),
            None => Ok(expr),
        }
    }

    fn terminal(&self, t: &Terminal, base: Expr) -> Result<Expr> {
        let filter = t
            .filter
            .as_ref()
            .map(|f| self.predicate(&f.member, &f.cmp, &f.value))
            .transpose()?;
        let member = || {
            t.member
                .as_deref()
                .ok_or_else(|| OpError::Dsl(format!("terminal '{}' needs a member", t.op)))
        };
        let (plain, filtered) = match t.op.as_str() {
            "first" => (OperatorId::First, OperatorId::FirstWhere),
            "first_or_default" => (OperatorId::FirstOrDefault, OperatorId::FirstOrDefaultWhere),
            "single" => (OperatorId::Single, OperatorId::SingleWhere),
            "single_or_default" => (OperatorId::SingleOrDefault, OperatorId::SingleOrDefaultWhere),
            "any" => (OperatorId::Any, OperatorId::AnyWhere),
            "count" => (OperatorId::Count, OperatorId::CountWhere),
            "long_count" => (OperatorId::LongCount, OperatorId::LongCountWhere),
            "all" => {
                let pred = filter.ok_or_else(|| OpError::Dsl("'all' needs a filter".into()))?;
                return self.apply(OperatorId::All, base, vec![pred]);
            }
            "min" | "max" => {
                let id = if t.op == "min" { OperatorId::MinBy } else { OperatorId::MaxBy };
                return self.apply(id, base, vec![self.selector(member()?)?]);
            }
            "sum" | "average" => {
                let m = member()?;
                let n = Numeric::from_type_ref(&self.field_type(m)?)
                    .ok_or_else(|| OpError::Unsupported(format!("{} over '{}'", t.op, m)))?;
                let id = if t.op == "sum" { OperatorId::SumBy(n) } else { OperatorId::AverageBy(n) };
                return self.apply(id, base, vec![self.selector(m)?]);
            }
            other => return Err(OpError::Dsl(format!("unknown terminal '{}'", other))),
        };
        match filter {
            Some(pred) => self.apply(filtered, base, vec![pred]),
            None => self.apply(plain, base, vec![]),
        }
    }
}

/// Parse and lower in one step.
pub fn build_query(registry: &Registry, src: &str) -> Result<Expr> {
    let doc = parse_yaml_query(src)?;
    QueryBuilder::new(registry, &doc.source)?.build(&doc)
}
