//! The instruction set contract and the compiled function record.

mod code;
mod instruction_set;

pub use code::{DecodeError, Function, Instr, SerializationError, SourceLocation};
pub use instruction_set::{Family, Opcode, Operand, Width};
