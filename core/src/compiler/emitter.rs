//! Instruction encoding, the constant pool and jump patching.

use ecow::EcoString;
use hashbrown::HashSet;
use tracing::trace;

use super::error::{CompileError, CompileErrorKind};
use crate::ast::Loc;
use crate::values::{Symbol, Value};
use crate::vm::{Family, Function, Opcode, Operand, SourceLocation, Width};

/// Byte offset of an unpatched 16-bit jump operand.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "every jump placeholder must be patched"]
pub struct JumpLabel(usize);

/// Writes instructions for a single function.
pub struct Emitter {
    function: Function,
    /// Placeholders emitted but not yet patched.
    pending: HashSet<usize>,
}

impl Emitter {
    pub fn new(name: impl Into<EcoString>, location: SourceLocation) -> Self {
        Self {
            function: Function::new(name, location),
            pending: HashSet::new(),
        }
    }

    /// Current end of the code; a backward jump target.
    pub fn offset(&self) -> usize {
        self.function.code.len()
    }

    pub fn function_mut(&mut self) -> &mut Function {
        &mut self.function
    }

    pub fn code(&self) -> &[u8] {
        &self.function.code
    }

    /// Append an instruction. Operands are encoded big-endian at the widths
    /// given by the opcode's layout.
    pub fn emit(&mut self, loc: &Loc, opcode: Opcode, operands: &[u32]) {
        let layout = opcode.operands();
        debug_assert_eq!(
            layout.len(),
            operands.len(),
            "wrong operand count for {opcode:?}"
        );
        self.function.code.push(opcode as u8);
        for (kind, value) in layout.iter().zip(operands) {
            push_operand(&mut self.function.code, *kind, *value);
        }
        self.record_line(loc.line);
    }

    pub fn emit_op(&mut self, loc: &Loc, opcode: Opcode) {
        self.emit(loc, opcode, &[]);
    }

    /// Emit the smallest variant of a width family that holds every
    /// operand.
    pub fn emit_family(&mut self, loc: &Loc, family: Family, operands: &[u32]) {
        let width = operands
            .iter()
            .map(|n| Width::of(*n))
            .max()
            .unwrap_or(Width::W8);
        self.emit(loc, family.opcode(width), operands);
    }

    fn record_line(&mut self, line: u32) {
        match self.function.lines.last_mut() {
            Some((last, count)) if *last == line => *count += 1,
            _ => self.function.lines.push((line, 1)),
        }
    }

    // === Constant Pool ===

    /// Append to the pool. Ids are dense and never reused.
    pub fn add_constant(&mut self, value: Value, loc: &Loc) -> Result<u32, CompileError> {
        let id = u32::try_from(self.function.constants.len())
            .map_err(|_| CompileError::new(CompileErrorKind::TooManyConstants, loc))?;
        self.function.constants.push(value);
        Ok(id)
    }

    pub fn emit_constant(&mut self, loc: &Loc, value: Value) -> Result<(), CompileError> {
        let id = self.add_constant(value, loc)?;
        self.emit_family(loc, Family::LoadValue, &[id]);
        Ok(())
    }

    pub fn emit_get_mod_const(&mut self, loc: &Loc, symbol: Symbol) {
        self.emit_family(loc, Family::GetConst, &[symbol.id()]);
    }

    pub fn emit_set_mod_const(&mut self, loc: &Loc, symbol: Symbol) {
        self.emit_family(loc, Family::SetConst, &[symbol.id()]);
    }

    // === Jumps ===

    /// Emit a forward jump with a zeroed operand, to be filled in by
    /// `patch_jump`.
    pub fn emit_jump(&mut self, loc: &Loc, opcode: Opcode) -> JumpLabel {
        debug_assert_eq!(opcode.operands(), &[Operand::Forward]);
        self.function.code.push(opcode as u8);
        let placeholder = self.function.code.len();
        self.function.code.extend_from_slice(&[0, 0]);
        self.record_line(loc.line);
        self.pending.insert(placeholder);
        JumpLabel(placeholder)
    }

    /// Point a placeholder at the current offset.
    pub fn patch_jump(&mut self, label: JumpLabel, loc: &Loc) -> Result<(), CompileError> {
        let JumpLabel(placeholder) = label;
        self.pending.remove(&placeholder);
        let distance = self.function.code.len() - placeholder - 2;
        let distance = u16::try_from(distance)
            .map_err(|_| CompileError::new(CompileErrorKind::JumpTooFar, loc))?;
        trace!(placeholder, distance, "Patched jump");
        self.function.code[placeholder..placeholder + 2].copy_from_slice(&distance.to_be_bytes());
        Ok(())
    }

    /// Emit a backward jump to `start`.
    pub fn emit_loop(&mut self, loc: &Loc, start: usize) -> Result<(), CompileError> {
        let distance = self.function.code.len() + Opcode::Loop.size() - start;
        let distance = u16::try_from(distance)
            .map_err(|_| CompileError::new(CompileErrorKind::JumpTooFar, loc))?;
        self.emit(loc, Opcode::Loop, &[distance as u32]);
        Ok(())
    }

    /// Number of placeholders still waiting for `patch_jump`.
    pub fn unpatched(&self) -> usize {
        self.pending.len()
    }

    // === Finalization ===

    /// Insert an instruction before everything emitted so far. It is counted
    /// in the first line run.
    pub fn prepend(&mut self, opcode: Opcode, operands: &[u32]) {
        let mut bytes = vec![opcode as u8];
        for (kind, value) in opcode.operands().iter().zip(operands) {
            push_operand(&mut bytes, *kind, *value);
        }
        self.function.code.splice(0..0, bytes);
        match self.function.lines.first_mut() {
            Some((_, count)) => *count += 1,
            None => self.function.lines.push((self.function.location.line, 1)),
        }
    }

    pub fn finish(self) -> Function {
        self.function
    }
}

fn push_operand(code: &mut Vec<u8>, kind: Operand, value: u32) {
    match kind {
        Operand::U8 => {
            debug_assert!(value <= u8::MAX as u32);
            code.push(value as u8);
        }
        Operand::U16 | Operand::Forward | Operand::Backward => {
            debug_assert!(value <= u16::MAX as u32);
            code.extend_from_slice(&(value as u16).to_be_bytes());
        }
        Operand::U32 => code.extend_from_slice(&value.to_be_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn emitter() -> Emitter {
        Emitter::new("test", SourceLocation::default())
    }

    #[test]
    fn test_patch_jump_backfills_big_endian_distance() {
        let loc = Loc::line(1);
        let mut e = emitter();
        let label = e.emit_jump(&loc, Opcode::Jump);
        for _ in 0..300 {
            e.emit_op(&loc, Opcode::Pop);
        }
        e.patch_jump(label, &loc).unwrap();
        // 300 = 0x012C
        assert_eq!(&e.code()[..3], &[Opcode::Jump as u8, 0x01, 0x2C]);
        assert_eq!(e.unpatched(), 0);
    }

    #[test]
    fn test_patch_jump_too_far() {
        let loc = Loc::line(1);
        let mut e = emitter();
        let label = e.emit_jump(&loc, Opcode::JumpUnless);
        for _ in 0..70_000 {
            e.emit_op(&loc, Opcode::Nop);
        }
        let err = e.patch_jump(label, &loc).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::JumpTooFar);
    }

    #[test]
    fn test_loop_distance() {
        let loc = Loc::line(1);
        let mut e = emitter();
        e.emit_op(&loc, Opcode::Nil);
        let start = e.offset();
        e.emit_op(&loc, Opcode::Pop);
        e.emit_loop(&loc, start).unwrap();
        let f = e.finish();
        assert_eq!(f.listing().unwrap(), vec!["Nil", "Pop", "Loop 4"]);
        assert_eq!(f.decode().unwrap()[2].jump_target(), Some(start));
    }

    #[test]
    fn test_width_selection() {
        let loc = Loc::line(1);
        let mut e = emitter();
        e.emit_family(&loc, Family::GetLocal, &[3]);
        e.emit_family(&loc, Family::GetLocal, &[300]);
        e.emit_family(&loc, Family::GetLocal, &[70_000]);
        e.emit_family(&loc, Family::LeaveScope, &[256, 2]);
        assert_eq!(
            e.finish().listing().unwrap(),
            vec![
                "GetLocal8 3",
                "GetLocal16 300",
                "GetLocal32 70000",
                "LeaveScope16 256 2"
            ]
        );
    }

    #[test]
    fn test_constants_are_not_deduplicated() {
        let loc = Loc::line(1);
        let mut e = emitter();
        e.emit_constant(&loc, Value::int(1)).unwrap();
        e.emit_constant(&loc, Value::int(1)).unwrap();
        let f = e.finish();
        assert_eq!(f.constants.len(), 2);
        assert_eq!(f.listing().unwrap(), vec!["LoadValue8 0", "LoadValue8 1"]);
    }

    #[test]
    fn test_line_runs() {
        let mut e = emitter();
        e.emit_op(&Loc::line(1), Opcode::Nil);
        e.emit_op(&Loc::line(1), Opcode::Pop);
        e.emit_op(&Loc::line(3), Opcode::True);
        e.prepend(Opcode::PrepLocals8, &[2]);
        let f = e.finish();
        assert_eq!(f.lines, vec![(1, 3), (3, 1)]);
        assert_eq!(f.listing().unwrap()[0], "PrepLocals8 2");
    }
}
