use core::fmt;
use core::ops::Range;

use ecow::EcoString;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use super::{Opcode, Operand};
use crate::values::Value;

/// Where a function was defined.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub source: EcoString,
    pub line: u32,
    pub span: Range<usize>,
}

/// A compiled function: the unit handed to the VM.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: EcoString,
    pub code: Vec<u8>,
    /// Run-length line info: `(line, instruction_count)` in code order.
    pub lines: Vec<(u32, u32)>,
    pub constants: Vec<Value>,
    pub arity: u8,
    /// Number of local slots, slot 0 (`self`) included. 0 when the function
    /// has no locals.
    pub frame_size: u32,
    pub location: SourceLocation,
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub offset: usize,
    pub opcode: Opcode,
    pub operands: SmallVec<[u32; 2]>,
}

impl Instr {
    /// Absolute target of a jump instruction.
    pub fn jump_target(&self) -> Option<usize> {
        let distance = *self.operands.first()? as usize;
        let next = self.offset + self.opcode.size();
        match self.opcode {
            Opcode::Loop => next.checked_sub(distance),
            op if op.is_jump() => Some(next + distance),
            _ => None,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.opcode)?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode 0x{byte:02X} at offset {offset}")]
    InvalidOpcode { offset: usize, byte: u8 },
    #[error("truncated operand for {opcode:?} at offset {offset}")]
    Truncated { offset: usize, opcode: Opcode },
}

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("failed to serialize function: {0}")]
    Encode(postcard::Error),
    #[error("failed to deserialize function: {0}")]
    Decode(postcard::Error),
}

impl Function {
    pub fn new(name: impl Into<EcoString>, location: SourceLocation) -> Self {
        Function {
            name: name.into(),
            code: Vec::new(),
            lines: Vec::new(),
            constants: Vec::new(),
            arity: 0,
            frame_size: 0,
            location,
        }
    }

    /// Decodes the whole instruction stream.
    pub fn decode(&self) -> Result<Vec<Instr>, DecodeError> {
        let mut out = Vec::new();
        let mut pc = 0;
        while pc < self.code.len() {
            let instr = decode_at(&self.code, pc)?;
            pc += instr.opcode.size();
            out.push(instr);
        }
        Ok(out)
    }

    /// Opcodes in order, without operands.
    pub fn opcodes(&self) -> Result<Vec<Opcode>, DecodeError> {
        Ok(self.decode()?.into_iter().map(|i| i.opcode).collect())
    }

    /// One line per instruction (`"LoadValue8 0"`), for assertions.
    pub fn listing(&self) -> Result<Vec<String>, DecodeError> {
        Ok(self.decode()?.iter().map(ToString::to_string).collect())
    }

    pub fn instruction_count(&self) -> usize {
        self.lines.iter().map(|(_, n)| *n as usize).sum()
    }

    /// Source line of the `index`th instruction.
    pub fn line_of(&self, index: usize) -> Option<u32> {
        let mut remaining = index;
        for &(line, count) in &self.lines {
            if remaining < count as usize {
                return Some(line);
            }
            remaining -= count as usize;
        }
        None
    }

    /// Nested functions in the constant pool.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.constants.iter().filter_map(|c| match c {
            Value::Function(f) => Some(f.as_ref()),
            _ => None,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        postcard::to_allocvec(self).map_err(SerializationError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        postcard::from_bytes(bytes).map_err(SerializationError::Decode)
    }
}

fn decode_at(code: &[u8], offset: usize) -> Result<Instr, DecodeError> {
    let byte = code[offset];
    let opcode = Opcode::from_repr(byte).ok_or(DecodeError::InvalidOpcode { offset, byte })?;
    let mut operands = SmallVec::new();
    let mut pos = offset + 1;
    for operand in opcode.operands() {
        let size = operand.size();
        let bytes = code
            .get(pos..pos + size)
            .ok_or(DecodeError::Truncated { offset, opcode })?;
        let value = match operand {
            Operand::U8 => bytes[0] as u32,
            Operand::U16 | Operand::Forward | Operand::Backward => {
                u16::from_be_bytes([bytes[0], bytes[1]]) as u32
            }
            Operand::U32 => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        };
        operands.push(value);
        pos += size;
    }
    Ok(Instr {
        offset,
        opcode,
        operands,
    })
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Function {} {{", self.name)?;
        writeln!(f, "  arity: {}", self.arity)?;
        writeln!(f, "  frame_size: {}", self.frame_size)?;

        if !self.constants.is_empty() {
            writeln!(f, "  constants: [")?;
            for (i, constant) in self.constants.iter().enumerate() {
                match constant {
                    Value::Function(func) => writeln!(f, "    [{i}] = <function {}>", func.name)?,
                    other => writeln!(f, "    [{i}] = {other}")?,
                }
            }
            writeln!(f, "  ]")?;
        } else {
            writeln!(f, "  constants: []")?;
        }

        let instrs = match self.decode() {
            Ok(instrs) => instrs,
            Err(err) => {
                writeln!(f, "  <{err}>")?;
                return write!(f, "}}");
            }
        };

        // Label every jump target, numbered in address order.
        let targets: HashSet<usize> = instrs.iter().filter_map(Instr::jump_target).collect();
        let mut sorted: Vec<usize> = targets.into_iter().collect();
        sorted.sort_unstable();
        let labels: HashMap<usize, usize> =
            sorted.into_iter().enumerate().map(|(i, addr)| (addr, i)).collect();

        writeln!(f, "  instructions:")?;
        for (index, instr) in instrs.iter().enumerate() {
            let label = labels
                .get(&instr.offset)
                .map(|l| format!("L{l}:"))
                .unwrap_or_default();
            let line = self.line_of(index).unwrap_or(0);
            match instr.jump_target() {
                Some(target) => {
                    let to = labels
                        .get(&target)
                        .map(|l| format!("L{l}"))
                        .unwrap_or_else(|| format!("@{target}"));
                    writeln!(
                        f,
                        "    {:4} {:>4} {:>4}  {} (to {})",
                        instr.offset, line, label, instr, to
                    )?;
                }
                None => writeln!(f, "    {:4} {:>4} {:>4}  {}", instr.offset, line, label, instr)?,
            }
        }

        write!(f, "}}")
    }
}
