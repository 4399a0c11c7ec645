//! Sized numbers and their arithmetic.
//!
//! These operations define what the constant folder may compute at compile
//! time. They mirror the VM: sized integers wrap, the default `Int` is
//! exact and grows into a big integer, floats follow IEEE 754, and anything
//! the VM would raise on (division by zero, negative integer exponents)
//! returns `None` so the operation is left to runtime.

use core::cmp::Ordering;
use core::fmt;

use num_bigint::BigInt;
use num_traits::{
    CheckedRem, PrimInt, ToPrimitive, WrappingAdd, WrappingMul, WrappingShl, WrappingShr,
    WrappingSub, Zero,
};
use serde::{Deserialize, Serialize};

use super::Value;
use crate::ast::{BinaryOp, FloatWidth, IntWidth};

/// Largest exponent folded for big integers. Larger powers are left to the
/// VM to keep the constant pool small.
const MAX_FOLDED_BIG_EXPONENT: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

/// Applies `$body` to the payload of a single `IntValue`, rebuilding the
/// same variant.
macro_rules! map_int {
    ($value:expr, |$x:ident| $body:expr) => {
        match $value {
            IntValue::I8($x) => IntValue::I8($body),
            IntValue::I16($x) => IntValue::I16($body),
            IntValue::I32($x) => IntValue::I32($body),
            IntValue::I64($x) => IntValue::I64($body),
            IntValue::U8($x) => IntValue::U8($body),
            IntValue::U16($x) => IntValue::U16($body),
            IntValue::U32($x) => IntValue::U32($body),
            IntValue::U64($x) => IntValue::U64($body),
        }
    };
}

/// Applies `$body` to two payloads of the same variant; mixed widths yield
/// `None`.
macro_rules! zip_int {
    ($a:expr, $b:expr, |$x:ident, $y:ident| $body:expr) => {
        match ($a, $b) {
            (IntValue::I8($x), IntValue::I8($y)) => $body.map(IntValue::I8),
            (IntValue::I16($x), IntValue::I16($y)) => $body.map(IntValue::I16),
            (IntValue::I32($x), IntValue::I32($y)) => $body.map(IntValue::I32),
            (IntValue::I64($x), IntValue::I64($y)) => $body.map(IntValue::I64),
            (IntValue::U8($x), IntValue::U8($y)) => $body.map(IntValue::U8),
            (IntValue::U16($x), IntValue::U16($y)) => $body.map(IntValue::U16),
            (IntValue::U32($x), IntValue::U32($y)) => $body.map(IntValue::U32),
            (IntValue::U64($x), IntValue::U64($y)) => $body.map(IntValue::U64),
            _ => None,
        }
    };
}

impl IntValue {
    /// Parses literal digits into the requested width. Returns `None` for
    /// malformed digits or values that do not fit.
    pub fn parse(digits: &str, radix: u32, width: IntWidth) -> Option<Self> {
        let digits = digits.replace('_', "");
        if digits.is_empty() {
            return None;
        }
        Some(match width {
            IntWidth::I8 => IntValue::I8(i8::from_str_radix(&digits, radix).ok()?),
            IntWidth::I16 => IntValue::I16(i16::from_str_radix(&digits, radix).ok()?),
            IntWidth::I32 => IntValue::I32(i32::from_str_radix(&digits, radix).ok()?),
            IntWidth::I64 => IntValue::I64(i64::from_str_radix(&digits, radix).ok()?),
            IntWidth::U8 => IntValue::U8(u8::from_str_radix(&digits, radix).ok()?),
            IntWidth::U16 => IntValue::U16(u16::from_str_radix(&digits, radix).ok()?),
            IntWidth::U32 => IntValue::U32(u32::from_str_radix(&digits, radix).ok()?),
            IntWidth::U64 => IntValue::U64(u64::from_str_radix(&digits, radix).ok()?),
            IntWidth::Big => return None,
        })
    }

    pub fn class_name(self) -> &'static str {
        match self {
            IntValue::I8(_) => "Int8",
            IntValue::I16(_) => "Int16",
            IntValue::I32(_) => "Int32",
            IntValue::I64(_) => "Int64",
            IntValue::U8(_) => "UInt8",
            IntValue::U16(_) => "UInt16",
            IntValue::U32(_) => "UInt32",
            IntValue::U64(_) => "UInt64",
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            IntValue::I8(x) => Some(x.into()),
            IntValue::I16(x) => Some(x.into()),
            IntValue::I32(x) => Some(x.into()),
            IntValue::I64(x) => Some(x),
            IntValue::U8(x) => Some(x.into()),
            IntValue::U16(x) => Some(x.into()),
            IntValue::U32(x) => Some(x.into()),
            IntValue::U64(x) => x.to_i64(),
        }
    }

    /// Same-width arithmetic that wraps on overflow. The default `Int`
    /// goes through [`unbounded_binary`] instead.
    pub fn binary(self, op: BinaryOp, rhs: IntValue) -> Option<IntValue> {
        zip_int!(self, rhs, |a, b| int_binary(op, a, b))
    }

    pub fn negate(self) -> IntValue {
        map_int!(self, |x| x.wrapping_neg())
    }

    pub fn bit_not(self) -> IntValue {
        map_int!(self, |x| !x)
    }

    /// Ordering between two integers of the same width.
    pub fn compare(self, rhs: IntValue) -> Option<Ordering> {
        Some(match (self, rhs) {
            (IntValue::I8(a), IntValue::I8(b)) => a.cmp(&b),
            (IntValue::I16(a), IntValue::I16(b)) => a.cmp(&b),
            (IntValue::I32(a), IntValue::I32(b)) => a.cmp(&b),
            (IntValue::I64(a), IntValue::I64(b)) => a.cmp(&b),
            (IntValue::U8(a), IntValue::U8(b)) => a.cmp(&b),
            (IntValue::U16(a), IntValue::U16(b)) => a.cmp(&b),
            (IntValue::U32(a), IntValue::U32(b)) => a.cmp(&b),
            (IntValue::U64(a), IntValue::U64(b)) => a.cmp(&b),
            _ => return None,
        })
    }
}

/// Fixed-width integer arithmetic with VM semantics.
fn int_binary<T>(op: BinaryOp, a: T, b: T) -> Option<T>
where
    T: PrimInt + CheckedRem + WrappingAdd + WrappingSub + WrappingMul + WrappingShl + WrappingShr,
{
    match op {
        BinaryOp::Add => Some(a.wrapping_add(&b)),
        BinaryOp::Sub => Some(a.wrapping_sub(&b)),
        BinaryOp::Mul => Some(a.wrapping_mul(&b)),
        BinaryOp::Div => {
            if b.is_zero() {
                return None;
            }
            // MIN / -1 overflows; the VM wraps it back to MIN.
            Some(a.checked_div(&b).unwrap_or(a))
        }
        BinaryOp::Mod => {
            if b.is_zero() {
                return None;
            }
            Some(a.checked_rem(&b).unwrap_or_else(T::zero))
        }
        BinaryOp::Pow => Some(wrapping_pow(a, b.to_u32()?)),
        BinaryOp::BitAnd => Some(a & b),
        BinaryOp::BitOr => Some(a | b),
        BinaryOp::BitXor => Some(a ^ b),
        BinaryOp::Shl => Some(a.wrapping_shl(b.to_u32()?)),
        BinaryOp::Shr => Some(a.wrapping_shr(b.to_u32()?)),
    }
}

fn wrapping_pow<T: PrimInt + WrappingMul>(mut base: T, mut exp: u32) -> T {
    let mut acc = T::one();
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.wrapping_mul(&base);
        }
        base = base.wrapping_mul(&base);
        exp >>= 1;
    }
    acc
}

/// Arithmetic on two default `Int`s. Results outside the 64-bit range are
/// promoted to big integers rather than wrapped.
pub fn unbounded_binary(op: BinaryOp, a: i64, b: i64) -> Option<Value> {
    let exact = match op {
        BinaryOp::Div | BinaryOp::Mod if b == 0 => return None,
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Mod => a.checked_rem(b),
        BinaryOp::BitAnd => Some(a & b),
        BinaryOp::BitOr => Some(a | b),
        BinaryOp::BitXor => Some(a ^ b),
        BinaryOp::Pow | BinaryOp::Shl | BinaryOp::Shr => None,
    };
    match exact {
        Some(n) => Some(Value::int(n)),
        None => big_binary(op, &BigInt::from(a), &BigInt::from(b)).map(Value::unbounded),
    }
}

/// Arbitrary-precision arithmetic. Only division by zero, negative
/// exponents and oversized powers/shifts are left to runtime.
pub fn big_binary(op: BinaryOp, a: &BigInt, b: &BigInt) -> Option<BigInt> {
    match op {
        BinaryOp::Add => Some(a + b),
        BinaryOp::Sub => Some(a - b),
        BinaryOp::Mul => Some(a * b),
        BinaryOp::Div if b.is_zero() => None,
        BinaryOp::Div => Some(a / b),
        BinaryOp::Mod if b.is_zero() => None,
        BinaryOp::Mod => Some(a % b),
        BinaryOp::Pow => {
            let exp = b.to_u32().filter(|e| *e <= MAX_FOLDED_BIG_EXPONENT)?;
            Some(a.pow(exp))
        }
        BinaryOp::BitAnd => Some(a & b),
        BinaryOp::BitOr => Some(a | b),
        BinaryOp::BitXor => Some(a ^ b),
        BinaryOp::Shl => {
            let shift = b.to_u32().filter(|s| *s <= MAX_FOLDED_BIG_EXPONENT)?;
            Some(a << shift)
        }
        BinaryOp::Shr => Some(a >> b.to_u32()?),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FloatValue {
    F32(f32),
    F64(f64),
}

impl FloatValue {
    pub fn parse(text: &str, width: FloatWidth) -> Option<Self> {
        let text = text.replace('_', "");
        match width {
            FloatWidth::F32 => text.parse().ok().map(FloatValue::F32),
            FloatWidth::F64 => text.parse().ok().map(FloatValue::F64),
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            FloatValue::F32(_) => "Float32",
            FloatValue::F64(_) => "Float",
        }
    }

    /// IEEE 754 arithmetic; bitwise operators do not apply to floats.
    pub fn binary(self, op: BinaryOp, rhs: FloatValue) -> Option<FloatValue> {
        match (self, rhs) {
            (FloatValue::F32(a), FloatValue::F32(b)) => float_binary(op, a, b).map(FloatValue::F32),
            (FloatValue::F64(a), FloatValue::F64(b)) => float_binary(op, a, b).map(FloatValue::F64),
            _ => None,
        }
    }

    pub fn negate(self) -> FloatValue {
        match self {
            FloatValue::F32(x) => FloatValue::F32(-x),
            FloatValue::F64(x) => FloatValue::F64(-x),
        }
    }

    pub fn compare(self, rhs: FloatValue) -> Option<Ordering> {
        match (self, rhs) {
            (FloatValue::F32(a), FloatValue::F32(b)) => a.partial_cmp(&b),
            (FloatValue::F64(a), FloatValue::F64(b)) => a.partial_cmp(&b),
            _ => None,
        }
    }
}

fn float_binary<T: num_traits::Float>(op: BinaryOp, a: T, b: T) -> Option<T> {
    match op {
        BinaryOp::Add => Some(a + b),
        BinaryOp::Sub => Some(a - b),
        BinaryOp::Mul => Some(a * b),
        BinaryOp::Div => Some(a / b),
        BinaryOp::Mod => Some(a % b),
        BinaryOp::Pow => Some(a.powf(b)),
        BinaryOp::BitAnd
        | BinaryOp::BitOr
        | BinaryOp::BitXor
        | BinaryOp::Shl
        | BinaryOp::Shr => None,
    }
}

impl fmt::Display for IntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntValue::I8(x) => write!(f, "{x}_i8"),
            IntValue::I16(x) => write!(f, "{x}_i16"),
            IntValue::I32(x) => write!(f, "{x}_i32"),
            IntValue::I64(x) => write!(f, "{x}"),
            IntValue::U8(x) => write!(f, "{x}_u8"),
            IntValue::U16(x) => write!(f, "{x}_u16"),
            IntValue::U32(x) => write!(f, "{x}_u32"),
            IntValue::U64(x) => write!(f, "{x}_u64"),
        }
    }
}

impl fmt::Display for FloatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatValue::F32(x) => write!(f, "{x:?}_f32"),
            FloatValue::F64(x) => write!(f, "{x:?}"),
        }
    }
}
