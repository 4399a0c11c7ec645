//! Compile-time evaluation of constant expressions.
//!
//! `resolve` is pure and conservative: it only computes what the VM would
//! compute identically, and returns `None` for everything else (including
//! operations the VM would raise on). Method calls are never folded.

use core::cmp::Ordering;

use ecow::{EcoString, eco_format};
use hashbrown::HashMap;
use num_bigint::BigInt;

use super::collections::{StaticElement, collect};
use crate::ast::{
    BinaryOp, ComparisonOp, ContainerKind, Element, IntWidth, LogicalOp, Node, NodeKind, StrPart,
    UnaryOp,
};
use crate::values::{FloatValue, IntValue, Value, big_binary, unbounded_binary};

/// Source of module constant values.
pub trait ConstantLookup {
    /// The value of a constant defined earlier, if it is known statically.
    fn constant(&self, path: &str) -> Option<Value>;
}

impl ConstantLookup for () {
    fn constant(&self, _path: &str) -> Option<Value> {
        None
    }
}

/// Module constants seen so far. `None` marks a constant whose value is
/// only known at runtime.
pub type ModuleConstants = HashMap<EcoString, Option<Value>>;

impl ConstantLookup for ModuleConstants {
    fn constant(&self, path: &str) -> Option<Value> {
        self.get(path).cloned().flatten()
    }
}

/// `A::B::C` as a single constant name.
pub fn const_path(path: &[&str]) -> EcoString {
    let mut name = EcoString::new();
    for (i, segment) in path.iter().enumerate() {
        if i > 0 {
            name.push_str("::");
        }
        name.push_str(segment);
    }
    name
}

pub fn resolve(node: &Node<'_>, constants: &dyn ConstantLookup) -> Option<Value> {
    match &node.kind {
        NodeKind::Nil => Some(Value::Nil),
        NodeKind::Bool(b) => Some(Value::Bool(*b)),
        NodeKind::Int {
            digits,
            radix,
            width,
        } => parse_int(digits, *radix, *width),
        NodeKind::Float { text, width } => FloatValue::parse(text, *width).map(Value::Float),
        NodeKind::Str(s) => Some(Value::str(*s)),
        NodeKind::Symbol(s) => Some(Value::symbol(*s)),
        NodeKind::Interpolation(parts) => static_string(parts, constants).map(Value::Str),
        NodeKind::Regex { parts, flags } => {
            let flags = regex_flags(flags).ok()?;
            let source = static_string(parts, constants)?;
            validate_regex(&source, flags).ok()?;
            Some(Value::Regex { source, flags })
        }
        NodeKind::Range {
            from,
            to,
            exclusive,
        } => {
            let from = resolve(from, constants)?;
            let to = resolve(to, constants)?;
            let integral = |v: &Value| matches!(v, Value::Int(_) | Value::BigInt(_));
            if !(integral(&from) && integral(&to)) {
                return None;
            }
            Some(Value::Range {
                from: Box::new(from),
                to: Box::new(to),
                exclusive: *exclusive,
            })
        }
        NodeKind::Collection {
            kind,
            elements,
            capacity: None,
        } => collection(*kind, elements, constants),
        NodeKind::ConstRef(path) => constants.constant(&const_path(path)),
        NodeKind::Unary { op, operand } => unary(*op, resolve(operand, constants)?),
        NodeKind::Binary { op, left, right } => {
            binary(*op, &resolve(left, constants)?, &resolve(right, constants)?)
        }
        NodeKind::Comparison { op, left, right } => {
            compare(*op, &resolve(left, constants)?, &resolve(right, constants)?)
        }
        NodeKind::Logical { op, left, right } => {
            let left = resolve(left, constants)?;
            if logical_short_circuits(*op, &left) {
                Some(left)
            } else {
                resolve(right, constants)
            }
        }
        _ => None,
    }
}

/// Whether a logical operator yields its left operand without evaluating
/// the right one.
pub fn logical_short_circuits(op: LogicalOp, left: &Value) -> bool {
    match op {
        LogicalOp::And => !left.is_truthy(),
        LogicalOp::Or => left.is_truthy(),
        LogicalOp::Coalesce => !matches!(left, Value::Nil),
    }
}

/// An unsuffixed literal too large for 64 bits is a big integer.
pub fn parse_int(digits: &str, radix: u32, width: IntWidth) -> Option<Value> {
    match width {
        IntWidth::Big => parse_big(digits, radix).map(Value::BigInt),
        IntWidth::I64 => IntValue::parse(digits, radix, width)
            .map(Value::Int)
            .or_else(|| parse_big(digits, radix).map(Value::BigInt)),
        _ => IntValue::parse(digits, radix, width).map(Value::Int),
    }
}

fn parse_big(digits: &str, radix: u32) -> Option<BigInt> {
    let digits = digits.replace('_', "");
    BigInt::parse_bytes(digits.as_bytes(), radix)
}

/// A collection literal whose elements all fold. Generated elements and
/// elements of the wrong shape leave it to the compiler.
fn collection(
    kind: ContainerKind,
    elements: &[Element<'_>],
    constants: &dyn ConstantLookup,
) -> Option<Value> {
    let elements = elements
        .iter()
        .map(|element| match (kind, element) {
            (ContainerKind::List | ContainerKind::Tuple | ContainerKind::Set, Element::Item(node)) => {
                resolve(node, constants).map(StaticElement::Item)
            }
            (ContainerKind::Map, Element::Keyed { key, value }) => Some(StaticElement::Entry(
                resolve(key, constants)?,
                resolve(value, constants)?,
            )),
            (ContainerKind::Record, Element::Keyed { key, value }) => {
                let (Value::Symbol(name) | Value::Str(name)) = resolve(key, constants)? else {
                    return None;
                };
                Some(StaticElement::Field(name, resolve(value, constants)?))
            }
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(collect(kind, elements))
}

/// Concatenation of parts that are all static strings.
fn static_string(parts: &[StrPart<'_>], constants: &dyn ConstantLookup) -> Option<EcoString> {
    let mut out = EcoString::new();
    for part in parts {
        match part {
            StrPart::Lit(s) => out.push_str(s),
            StrPart::Expr(node) => match resolve(node, constants)? {
                Value::Str(s) => out.push_str(&s),
                _ => return None,
            },
        }
    }
    Some(out)
}

/// Regex flag letters and their bits.
const REGEX_FLAGS: [(char, u8); 5] = [('i', 1), ('m', 2), ('x', 4), ('s', 8), ('u', 16)];

pub fn regex_flags(flags: &str) -> Result<u8, EcoString> {
    flags.chars().try_fold(0u8, |bits, c| {
        REGEX_FLAGS
            .iter()
            .find(|(flag, _)| *flag == c)
            .map(|(_, bit)| bits | bit)
            .ok_or_else(|| eco_format!("unknown flag '{c}'"))
    })
}

pub fn validate_regex(source: &str, flags: u8) -> Result<(), EcoString> {
    regex::RegexBuilder::new(source)
        .case_insensitive(flags & 1 != 0)
        .multi_line(flags & 2 != 0)
        .ignore_whitespace(flags & 4 != 0)
        .dot_matches_new_line(flags & 8 != 0)
        .unicode(true)
        .build()
        .map(|_| ())
        .map_err(|err| eco_format!("{err}"))
}

fn unary(op: UnaryOp, value: Value) -> Option<Value> {
    match (op, value) {
        (UnaryOp::Not, v) => Some(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(IntValue::I64(i))) => Some(match i.checked_neg() {
            Some(n) => Value::int(n),
            None => Value::BigInt(-BigInt::from(i)),
        }),
        (UnaryOp::Neg, Value::Int(i)) => Some(Value::Int(i.negate())),
        (UnaryOp::Neg, Value::BigInt(i)) => Some(Value::BigInt(-i)),
        (UnaryOp::Neg, Value::Float(f)) => Some(Value::Float(f.negate())),
        (UnaryOp::BitNot, Value::Int(i)) => Some(Value::Int(i.bit_not())),
        (UnaryOp::BitNot, Value::BigInt(i)) => Some(Value::BigInt(!i)),
        _ => None,
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Int(IntValue::I64(a)), Value::Int(IntValue::I64(b))) => {
            unbounded_binary(op, *a, *b)
        }
        (Value::Int(a), Value::Int(b)) => a.binary(op, *b).map(Value::Int),
        (Value::BigInt(a), Value::BigInt(b)) => big_binary(op, a, b).map(Value::BigInt),
        (Value::Int(IntValue::I64(a)), Value::BigInt(b)) => {
            big_binary(op, &BigInt::from(*a), b).map(Value::BigInt)
        }
        (Value::BigInt(a), Value::Int(IntValue::I64(b))) => {
            big_binary(op, a, &BigInt::from(*b)).map(Value::BigInt)
        }
        (Value::Float(a), Value::Float(b)) => a.binary(op, *b).map(Value::Float),
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
            let mut s = a.clone();
            s.push_str(b);
            Some(Value::Str(s))
        }
        _ => None,
    }
}

fn compare(op: ComparisonOp, left: &Value, right: &Value) -> Option<Value> {
    let same_kind = left.class_name() == right.class_name();
    let result = match op {
        ComparisonOp::Eq | ComparisonOp::StrictEq if same_kind && left.is_scalar() => {
            left == right
        }
        ComparisonOp::Neq | ComparisonOp::StrictNeq if same_kind && left.is_scalar() => {
            left != right
        }
        ComparisonOp::Lt | ComparisonOp::Le | ComparisonOp::Gt | ComparisonOp::Ge => {
            let ordering = match (left, right) {
                (Value::Int(a), Value::Int(b)) => Some(a.compare(*b)?),
                (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
                (Value::Int(IntValue::I64(a)), Value::BigInt(b)) => Some(BigInt::from(*a).cmp(b)),
                (Value::BigInt(a), Value::Int(IntValue::I64(b))) => Some(a.cmp(&BigInt::from(*b))),
                (Value::Float(a), Value::Float(b)) if same_kind => a.compare(*b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => return None,
            };
            // An unordered pair (NaN) fails every ordering test.
            ordering.is_some_and(|o| match op {
                ComparisonOp::Lt => o == Ordering::Less,
                ComparisonOp::Le => o != Ordering::Greater,
                ComparisonOp::Gt => o == Ordering::Greater,
                _ => o != Ordering::Less,
            })
        }
        _ => return None,
    };
    Some(Value::Bool(result))
}
