//! Cinder VM instruction set.
//!
//! Instructions are variable length: a one-byte opcode followed by zero or
//! more operands. Multi-byte operands are big-endian.
//!
//! # Width families
//!
//! Instructions whose operand is an index (constant id, local slot, symbol
//! id, element count) come in three variants carrying an 8, 16 or 32-bit
//! operand. The emitter always picks the smallest variant that fits:
//! ```text
//! LOAD_VALUE8  0x14 ii
//! LOAD_VALUE16 0x15 ii ii
//! LOAD_VALUE32 0x16 ii ii ii ii
//! ```
//!
//! # Jumps
//!
//! Jump operands are fixed 16-bit unsigned distances, relative to the byte
//! following the operand. Forward jumps (`JUMP*`, `FOR_IN`) add the
//! distance; `LOOP` subtracts it.
//!
//! # Stack Discipline
//!
//! Stack effect notation: `[..., operand1, operand2] -> [..., result]`.
//! Conditional jumps peek at the condition and leave it on the stack.

use strum::FromRepr;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
pub enum Opcode {
    /// No operation
    Nop = 0x00,

    // ========================================================================
    // Stack (0x01 - 0x0F)
    // ========================================================================
    /// Stack: [..., a] -> [...]
    Pop = 0x01,
    /// Stack: [..., a, b] -> [...]
    Pop2 = 0x02,
    /// Drop the value below the top.
    /// Stack: [..., a, b] -> [..., b]
    PopSkipOne = 0x03,
    /// Stack: [..., a] -> [..., a, a]
    Dup = 0x04,
    /// Stack: [..., a, b] -> [..., a, b, a, b]
    Dup2 = 0x05,
    /// Stack: [..., a, b] -> [..., b, a]
    Swap = 0x06,

    // ========================================================================
    // Literals & Constants (0x10 - 0x1F)
    // ========================================================================
    /// Stack: [...] -> [..., nil]
    Nil = 0x10,
    /// Stack: [...] -> [..., true]
    True = 0x11,
    /// Stack: [...] -> [..., false]
    False = 0x12,
    /// Replace the top value with a shallow copy. Emitted after loading a
    /// mutable constant so the pool entry is never aliased.
    /// Stack: [..., v] -> [..., copy]
    Copy = 0x13,
    /// Push constant from pool.
    /// Operand: index | Stack: [...] -> [..., value]
    LoadValue8 = 0x14,
    LoadValue16 = 0x15,
    LoadValue32 = 0x16,

    // ========================================================================
    // Locals & Module Constants (0x20 - 0x2F)
    // ========================================================================
    /// Operand: slot | Stack: [...] -> [..., value]
    GetLocal8 = 0x20,
    GetLocal16 = 0x21,
    GetLocal32 = 0x22,
    /// Store without popping.
    /// Operand: slot | Stack: [..., value] -> [..., value]
    SetLocal8 = 0x23,
    SetLocal16 = 0x24,
    SetLocal32 = 0x25,
    /// Operand: symbol id | Stack: [...] -> [..., value]
    GetConst8 = 0x26,
    GetConst16 = 0x27,
    GetConst32 = 0x28,
    /// Define a module constant, leaving the value on the stack.
    /// Operand: symbol id | Stack: [..., value] -> [..., value]
    SetConst8 = 0x29,
    SetConst16 = 0x2A,
    SetConst32 = 0x2B,

    // ========================================================================
    // Scopes (0x30 - 0x3F)
    // ========================================================================
    /// Release the `count` slots ending at `last`.
    /// Operands: last, count | Stack: unchanged
    LeaveScope8 = 0x30,
    LeaveScope16 = 0x31,
    LeaveScope32 = 0x32,
    /// Function prologue: reserve the frame.
    /// Operand: frame size | Stack: unchanged
    PrepLocals8 = 0x33,
    PrepLocals16 = 0x34,
    PrepLocals32 = 0x35,

    // ========================================================================
    // Arithmetic & Bitwise (0x40 - 0x4F)
    // ========================================================================
    /// Stack: [..., a, b] -> [..., a + b]
    Add = 0x40,
    Sub = 0x41,
    Mul = 0x42,
    Div = 0x43,
    Mod = 0x44,
    Pow = 0x45,
    BitAnd = 0x46,
    BitOr = 0x47,
    BitXor = 0x48,
    Shl = 0x49,
    Shr = 0x4A,
    /// Stack: [..., a] -> [..., -a]
    Negate = 0x4B,
    /// Stack: [..., a] -> [..., !a]
    Not = 0x4C,
    /// Stack: [..., a] -> [..., ~a]
    BitNot = 0x4D,

    // ========================================================================
    // Comparison (0x50 - 0x5F)
    // ========================================================================
    /// Stack: [..., a, b] -> [..., a == b]
    Equal = 0x50,
    NotEqual = 0x51,
    Less = 0x52,
    LessEqual = 0x53,
    Greater = 0x54,
    GreaterEqual = 0x55,
    /// `===`: same class and equal.
    StrictEqual = 0x56,
    StrictNotEqual = 0x57,
    /// Order-insensitive equality, used for static set patterns.
    LaxEqual = 0x58,
    /// Stack: [..., string, regex] -> [..., matched]
    Match = 0x59,
    NotMatch = 0x5A,
    /// Stack: [..., value, class] -> [..., is_instance]
    IsA = 0x5B,
    /// Whether `a` and `b` can be ordered against each other.
    /// Stack: [..., a, b] -> [..., comparable]
    IsComparable = 0x5C,

    // ========================================================================
    // Control Flow (0x60 - 0x6F)
    // ========================================================================
    /// Operand: u16 forward distance
    Jump = 0x60,
    /// Jump if the top value is truthy (peek).
    /// Operand: u16 forward distance | Stack: unchanged
    JumpIf = 0x61,
    /// Jump if the top value is falsy (peek).
    JumpUnless = 0x62,
    /// Jump if the top value is not nil (peek).
    JumpIfNotNil = 0x63,
    /// Operand: u16 backward distance
    Loop = 0x64,
    /// Stack: [..., iterable] -> [..., iterator]
    GetIterator = 0x65,
    /// Advance an iterator; jump when exhausted.
    /// Operand: u16 forward distance
    /// Stack: [..., iterator] -> [..., next] (falls through)
    /// Stack: [..., iterator] -> [...] (jumps)
    ForIn = 0x66,
    /// Stack: [..., value] -> (returns value)
    Return = 0x67,
    /// Raise a pattern match failure for a destructuring declaration.
    /// Stack: [..., value, matched] -> (raises)
    NoMatch = 0x68,

    // ========================================================================
    // Collections (0x70 - 0x8F)
    // ========================================================================
    /// Operand: capacity | Stack: [...] -> [..., list]
    NewList8 = 0x70,
    NewList16 = 0x71,
    NewList32 = 0x72,
    NewTuple8 = 0x73,
    NewTuple16 = 0x74,
    NewTuple32 = 0x75,
    NewSet8 = 0x76,
    NewSet16 = 0x77,
    NewSet32 = 0x78,
    NewMap8 = 0x79,
    NewMap16 = 0x7A,
    NewMap32 = 0x7B,
    NewRecord8 = 0x7C,
    NewRecord16 = 0x7D,
    NewRecord32 = 0x7E,
    /// Stack: [..., coll, v] -> [..., coll]
    Append = 0x80,
    /// Record field.
    /// Stack: [..., record, key, v] -> [..., record]
    AppendAt = 0x81,
    /// Stack: [..., map, key, v] -> [..., map]
    MapSet = 0x82,
    /// Append every element of `other`.
    /// Stack: [..., coll, other] -> [..., coll]
    Extend = 0x83,
    /// Stack: [..., coll, index] -> [..., value]
    Subscript = 0x84,
    /// Stack: [..., coll, index, v] -> [..., v]
    SubscriptSet = 0x85,
    /// Operand: u8 exclusive flag | Stack: [..., from, to] -> [..., range]
    NewRange = 0x86,

    // ========================================================================
    // Strings (0x90 - 0x9F)
    // ========================================================================
    /// Concatenate the string forms of the top `count` values.
    /// Operand: u8 count | Stack: [..., p1, ..., pN] -> [..., string]
    Interpolate = 0x90,
    /// Operands: u8 flags, u8 count | Stack: [..., p1, ..., pN] -> [..., regex]
    NewRegex = 0x91,

    // ========================================================================
    // Calls & Classes (0xA0 - 0xAF)
    // ========================================================================
    /// Operand: u8 argc | Stack: [..., callee, a1, ..., aN] -> [..., result]
    Call = 0xA0,
    /// Trailing arguments are named by the tuple of symbols on top.
    /// Operand: u8 argc | Stack: [..., callee, a1, ..., aN, names] -> [..., result]
    CallKw = 0xA1,
    /// Operands: u32 symbol, u8 argc
    /// Stack: [..., receiver, a1, ..., aN] -> [..., result]
    CallMethod = 0xA2,
    /// Operands: u32 symbol, u8 argc
    /// Stack: [..., receiver, a1, ..., aN, names] -> [..., result]
    CallMethodKw = 0xA3,
    /// Operand: u32 symbol | Stack: [...] -> [..., class]
    NewClass = 0xA4,
    /// Operand: u32 symbol | Stack: [..., class, function] -> [..., class]
    DefineMethod = 0xA5,
}
static_assertions::assert_eq_size!(Opcode, u8);

/// Shape of a single operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    U8,
    U16,
    U32,
    /// u16 forward distance.
    Forward,
    /// u16 backward distance.
    Backward,
}

impl Operand {
    pub const fn size(self) -> usize {
        match self {
            Operand::U8 => 1,
            Operand::U16 | Operand::Forward | Operand::Backward => 2,
            Operand::U32 => 4,
        }
    }
}

/// Operand width of a width-family instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Width {
    W8,
    W16,
    W32,
}

impl Width {
    /// Smallest width that holds `n`.
    pub const fn of(n: u32) -> Width {
        if n <= u8::MAX as u32 {
            Width::W8
        } else if n <= u16::MAX as u32 {
            Width::W16
        } else {
            Width::W32
        }
    }

    pub const fn operand(self) -> Operand {
        match self {
            Width::W8 => Operand::U8,
            Width::W16 => Operand::U16,
            Width::W32 => Operand::U32,
        }
    }
}

/// Instructions that exist in 8, 16 and 32-bit variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    LoadValue,
    GetLocal,
    SetLocal,
    GetConst,
    SetConst,
    LeaveScope,
    PrepLocals,
    NewList,
    NewTuple,
    NewSet,
    NewMap,
    NewRecord,
}

impl Family {
    pub const fn opcode(self, width: Width) -> Opcode {
        use Opcode::*;
        let [w8, w16, w32] = match self {
            Family::LoadValue => [LoadValue8, LoadValue16, LoadValue32],
            Family::GetLocal => [GetLocal8, GetLocal16, GetLocal32],
            Family::SetLocal => [SetLocal8, SetLocal16, SetLocal32],
            Family::GetConst => [GetConst8, GetConst16, GetConst32],
            Family::SetConst => [SetConst8, SetConst16, SetConst32],
            Family::LeaveScope => [LeaveScope8, LeaveScope16, LeaveScope32],
            Family::PrepLocals => [PrepLocals8, PrepLocals16, PrepLocals32],
            Family::NewList => [NewList8, NewList16, NewList32],
            Family::NewTuple => [NewTuple8, NewTuple16, NewTuple32],
            Family::NewSet => [NewSet8, NewSet16, NewSet32],
            Family::NewMap => [NewMap8, NewMap16, NewMap32],
            Family::NewRecord => [NewRecord8, NewRecord16, NewRecord32],
        };
        match width {
            Width::W8 => w8,
            Width::W16 => w16,
            Width::W32 => w32,
        }
    }
}

impl Opcode {
    /// Operand layout, used by the emitter's callers and the disassembler.
    pub const fn operands(self) -> &'static [Operand] {
        use Opcode::*;
        match self {
            LoadValue8 | GetLocal8 | SetLocal8 | GetConst8 | SetConst8 | PrepLocals8
            | NewList8 | NewTuple8 | NewSet8 | NewMap8 | NewRecord8 => &[Operand::U8],
            LoadValue16 | GetLocal16 | SetLocal16 | GetConst16 | SetConst16 | PrepLocals16
            | NewList16 | NewTuple16 | NewSet16 | NewMap16 | NewRecord16 => &[Operand::U16],
            LoadValue32 | GetLocal32 | SetLocal32 | GetConst32 | SetConst32 | PrepLocals32
            | NewList32 | NewTuple32 | NewSet32 | NewMap32 | NewRecord32 => &[Operand::U32],
            LeaveScope8 => &[Operand::U8, Operand::U8],
            LeaveScope16 => &[Operand::U16, Operand::U16],
            LeaveScope32 => &[Operand::U32, Operand::U32],

            Jump | JumpIf | JumpUnless | JumpIfNotNil | ForIn => &[Operand::Forward],
            Loop => &[Operand::Backward],

            NewRange | Interpolate | Call | CallKw => &[Operand::U8],
            NewRegex => &[Operand::U8, Operand::U8],
            CallMethod | CallMethodKw => &[Operand::U32, Operand::U8],
            NewClass | DefineMethod => &[Operand::U32],

            Nop | Pop | Pop2 | PopSkipOne | Dup | Dup2 | Swap | Nil | True | False | Copy
            | Add | Sub | Mul | Div | Mod | Pow | BitAnd | BitOr | BitXor | Shl | Shr
            | Negate | Not | BitNot | Equal | NotEqual | Less | LessEqual | Greater
            | GreaterEqual | StrictEqual | StrictNotEqual | LaxEqual | Match | NotMatch | IsA
            | IsComparable | Return | NoMatch | GetIterator | Append | AppendAt | MapSet
            | Extend | Subscript | SubscriptSet => &[],
        }
    }

    /// Encoded size in bytes, opcode included.
    pub const fn size(self) -> usize {
        let operands = self.operands();
        let mut size = 1;
        let mut i = 0;
        while i < operands.len() {
            size += operands[i].size();
            i += 1;
        }
        size
    }

    pub const fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::Jump
                | Opcode::JumpIf
                | Opcode::JumpUnless
                | Opcode::JumpIfNotNil
                | Opcode::ForIn
                | Opcode::Loop
        )
    }
}
