//! The expression language used by `#{}`, `${}`, named parameters and rule tests.
//!
//! Expressions are small: literals, identifier paths (`user.name`, `ids[0]`, `m['k']`),
//! arithmetic, comparisons, `&&`/`||`/`!` (or `and`/`or`/`not`), and a handful of
//! methods on text and collections. Identifiers resolve against an [`ArgSource`];
//! missing names evaluate to NULL.

use std::cmp::Ordering;

mod parser;

use crate::context::ArgSource;
use crate::error::SqlTemplateError;
use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Method(Box<Expr>, String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse an expression.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::Expression` describing the first problem found.
    pub fn parse(src: &str) -> Result<Expr, SqlTemplateError> {
        parser::parse(src.trim())
    }

    /// Evaluate against a parameter source.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::Expression` on type mismatches or division by zero,
    /// and propagates lookup errors from the source.
    pub fn eval(&self, source: &dyn ArgSource) -> Result<Value, SqlTemplateError> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => Ok(source.lookup(name)?.unwrap_or(Value::Null)),
            Expr::Field(target, name) => {
                // `a.b` may be a flat key in the source as well as a nested property
                if let Some(path) = self.dotted_path()
                    && let Some(value) = source.lookup(&path)?
                {
                    return Ok(value);
                }
                let target = target.eval(source)?;
                field(&target, name)
            }
            Expr::Index(target, index) => {
                let target = target.eval(source)?;
                let index = index.eval(source)?;
                index_value(&target, &index)
            }
            Expr::Method(target, name, args) => {
                let target = target.eval(source)?;
                let args = args
                    .iter()
                    .map(|arg| arg.eval(source))
                    .collect::<Result<Vec<_>, _>>()?;
                call_method(&target, name, &args)
            }
            Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!inner.eval(source)?.is_truthy())),
            Expr::Unary(UnaryOp::Neg, inner) => match inner.eval(source)? {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| SqlTemplateError::Expression("integer overflow".into())),
                Value::Float(f) => Ok(Value::Float(-f)),
                Value::Null => Ok(Value::Null),
                other => Err(SqlTemplateError::Expression(format!(
                    "cannot negate {other:?}"
                ))),
            },
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                if !lhs.eval(source)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(rhs.eval(source)?.is_truthy()))
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                if lhs.eval(source)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(rhs.eval(source)?.is_truthy()))
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.eval(source)?;
                let rhs = rhs.eval(source)?;
                binary(*op, &lhs, &rhs)
            }
        }
    }

    /// Evaluate and reduce to a boolean.
    ///
    /// # Errors
    ///
    /// Same as [`Expr::eval`].
    pub fn test(&self, source: &dyn ArgSource) -> Result<bool, SqlTemplateError> {
        Ok(self.eval(source)?.is_truthy())
    }

    /// `a.b.c` for pure identifier paths, `None` otherwise.
    #[must_use]
    pub fn dotted_path(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Field(target, name) => target.dotted_path().map(|base| format!("{base}.{name}")),
            _ => None,
        }
    }
}

fn field(target: &Value, name: &str) -> Result<Value, SqlTemplateError> {
    match target {
        Value::Null => Ok(Value::Null),
        Value::Map(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Json(json) => Ok(json.get(name).cloned().map_or(Value::Null, Value::from)),
        // bean-style property access for the common collection accessors
        Value::List(_) | Value::Text(_) if name == "length" || name == "size" => {
            call_method(target, name, &[])
        }
        other => Err(SqlTemplateError::Expression(format!(
            "no property `{name}` on {other:?}"
        ))),
    }
}

fn index_value(target: &Value, index: &Value) -> Result<Value, SqlTemplateError> {
    match (target, index) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::List(items), Value::Int(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null)),
        (Value::Map(map), key) => Ok(map.get(&key.render()).cloned().unwrap_or(Value::Null)),
        (Value::Json(json), Value::Int(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| json.get(i).cloned())
            .map_or(Value::Null, Value::from)),
        (Value::Json(json), key) => Ok(json
            .get(key.render())
            .cloned()
            .map_or(Value::Null, Value::from)),
        (other, key) => Err(SqlTemplateError::Expression(format!(
            "cannot index {other:?} with {key:?}"
        ))),
    }
}

fn call_method(target: &Value, name: &str, args: &[Value]) -> Result<Value, SqlTemplateError> {
    let arg = |n: usize| {
        args.get(n).ok_or_else(|| {
            SqlTemplateError::Expression(format!("`{name}` expects {} argument(s)", n + 1))
        })
    };
    let as_len = |n: usize| Value::Int(i64::try_from(n).unwrap_or(i64::MAX));

    match (name, target) {
        ("toString", value) => Ok(Value::Text(value.render())),
        ("isEmpty", Value::Text(s)) => Ok(Value::Bool(s.is_empty())),
        ("isEmpty", Value::List(items)) => Ok(Value::Bool(items.is_empty())),
        ("isEmpty", Value::Map(map)) => Ok(Value::Bool(map.is_empty())),
        ("isEmpty", Value::Blob(bytes)) => Ok(Value::Bool(bytes.is_empty())),
        ("size" | "length", Value::Text(s)) => Ok(as_len(s.chars().count())),
        ("size" | "length", Value::List(items)) => Ok(as_len(items.len())),
        ("size" | "length", Value::Map(map)) => Ok(as_len(map.len())),
        ("size" | "length", Value::Blob(bytes)) => Ok(as_len(bytes.len())),
        ("trim", Value::Text(s)) => Ok(Value::Text(s.trim().to_string())),
        ("toUpperCase", Value::Text(s)) => Ok(Value::Text(s.to_uppercase())),
        ("toLowerCase", Value::Text(s)) => Ok(Value::Text(s.to_lowercase())),
        ("contains", Value::Text(s)) => Ok(Value::Bool(s.contains(&arg(0)?.render()))),
        ("contains", Value::List(items)) => {
            let needle = arg(0)?;
            Ok(Value::Bool(items.iter().any(|item| values_equal(item, needle))))
        }
        ("contains" | "containsKey", Value::Map(map)) => {
            Ok(Value::Bool(map.contains_key(&arg(0)?.render())))
        }
        ("startsWith", Value::Text(s)) => Ok(Value::Bool(s.starts_with(&arg(0)?.render()))),
        ("endsWith", Value::Text(s)) => Ok(Value::Bool(s.ends_with(&arg(0)?.render()))),
        (_, Value::Null) => Err(SqlTemplateError::Expression(format!(
            "method `{name}` called on null"
        ))),
        (_, other) => Err(SqlTemplateError::Expression(format!(
            "no method `{name}` on {other:?}"
        ))),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Text(a), Value::Text(b)) => a == b,
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => a == b,
            _ => match (lhs, rhs) {
                (Value::Text(_), _) | (_, Value::Text(_)) => lhs.render() == rhs.render(),
                _ => lhs == rhs,
            },
        },
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Result<Option<Ordering>, SqlTemplateError> {
    match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
        (Value::Text(a), Value::Text(b)) => Ok(Some(a.cmp(b))),
        (Value::Date(a), Value::Date(b)) => Ok(Some(a.cmp(b))),
        (Value::Time(a), Value::Time(b)) => Ok(Some(a.cmp(b))),
        (Value::Timestamp(a), Value::Timestamp(b)) => Ok(Some(a.cmp(b))),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(SqlTemplateError::Expression(format!(
                "cannot compare {lhs:?} with {rhs:?}"
            ))),
        },
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, SqlTemplateError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(lhs, rhs)?;
            Ok(Value::Bool(ordering.is_some_and(|ord| match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            })))
        }
        BinaryOp::Add if matches!(lhs, Value::Text(_)) || matches!(rhs, Value::Text(_)) => {
            Ok(Value::Text(format!("{}{}", lhs.render(), rhs.render())))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs)
        }
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(match op {
            BinaryOp::And => lhs.is_truthy() && rhs.is_truthy(),
            _ => lhs.is_truthy() || rhs.is_truthy(),
        })),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, SqlTemplateError> {
    let overflow = || SqlTemplateError::Expression("integer overflow".into());
    let div_zero = || SqlTemplateError::Expression("division by zero".into());

    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        let (a, b) = (*a, *b);
        return match op {
            BinaryOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Div if b == 0 => Err(div_zero()),
            BinaryOp::Div => a.checked_div(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Rem if b == 0 => Err(div_zero()),
            _ => a.checked_rem(b).map(Value::Int).ok_or_else(overflow),
        };
    }
    let (Some(a), Some(b)) = (lhs.as_float(), rhs.as_float()) else {
        return Err(SqlTemplateError::Expression(format!(
            "cannot apply {op:?} to {lhs:?} and {rhs:?}"
        )));
    };
    match op {
        BinaryOp::Add => Ok(Value::Float(a + b)),
        BinaryOp::Sub => Ok(Value::Float(a - b)),
        BinaryOp::Mul => Ok(Value::Float(a * b)),
        BinaryOp::Div if b == 0.0 => Err(div_zero()),
        BinaryOp::Div => Ok(Value::Float(a / b)),
        BinaryOp::Rem if b == 0.0 => Err(div_zero()),
        _ => Ok(Value::Float(a % b)),
    }
}
