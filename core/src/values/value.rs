use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use ecow::EcoString;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::{FloatValue, IntValue};
use crate::vm::Function;

/// A compile-time value: the result of constant folding and the content of
/// a function's constant pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(IntValue),
    BigInt(BigInt),
    Float(FloatValue),
    Str(EcoString),
    Symbol(EcoString),
    Regex {
        source: EcoString,
        flags: u8,
    },
    Range {
        from: Box<Value>,
        to: Box<Value>,
        exclusive: bool,
    },
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Record(Vec<(EcoString, Value)>),
    Function(Arc<Function>),
}

impl Value {
    pub fn str(s: impl Into<EcoString>) -> Self {
        Value::Str(s.into())
    }

    pub fn symbol(s: impl Into<EcoString>) -> Self {
        Value::Symbol(s.into())
    }

    pub fn int(i: i64) -> Self {
        Value::Int(IntValue::I64(i))
    }

    /// An `Int` when `n` fits in 64 bits, a `BigInt` otherwise.
    pub fn unbounded(n: BigInt) -> Self {
        match n.to_i64() {
            Some(i) => Value::int(i),
            None => Value::BigInt(n),
        }
    }

    pub fn float(f: f64) -> Self {
        Value::Float(FloatValue::F64(f))
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Name of the runtime class of this value, as known to `IS_A`.
    pub fn class_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Int(i) => i.class_name(),
            Value::BigInt(_) => "BigInt",
            Value::Float(f) => f.class_name(),
            Value::Str(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Regex { .. } => "Regex",
            Value::Range { .. } => "Range",
            Value::List(_) => "List",
            Value::Tuple(_) => "Tuple",
            Value::Set(_) => "Set",
            Value::Map(_) => "Map",
            Value::Record(_) => "Record",
            Value::Function(_) => "Function",
        }
    }

    /// Whether the VM can copy-on-load this value (see `COPY`).
    pub fn is_mutable(&self) -> bool {
        matches!(self, Value::List(_) | Value::Set(_) | Value::Map(_))
    }

    /// Scalars compare equal structurally at compile time; collections and
    /// functions defer to the VM.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Nil
                | Value::Bool(_)
                | Value::Int(_)
                | Value::BigInt(_)
                | Value::Float(_)
                | Value::Str(_)
                | Value::Symbol(_)
        )
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<IntValue> for Value {
    fn from(i: IntValue) -> Self {
        Value::Int(i)
    }
}

impl From<FloatValue> for Value {
    fn from(f: FloatValue) -> Self {
        Value::Float(f)
    }
}

fn write_seq<'v>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: impl IntoIterator<Item = &'v Value>,
    close: &str,
) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "{close}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::BigInt(i) => write!(f, "{i}n"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Symbol(s) => write!(f, ":{s}"),
            Value::Regex { source, flags } => write!(f, "%/{source}/{flags:#04x}"),
            Value::Range {
                from,
                to,
                exclusive,
            } => {
                let dots = if *exclusive { "..<" } else { ".." };
                write!(f, "{from}{dots}{to}")
            }
            Value::List(items) => write_seq(f, "[", items, "]"),
            Value::Tuple(items) => write_seq(f, "(", items, ")"),
            Value::Set(items) => write_seq(f, "%{", items, "}"),
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Record(fields) => {
                write!(f, "%{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "<function {}>", func.name),
        }
    }
}
