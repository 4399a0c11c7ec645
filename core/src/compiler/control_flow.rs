//! Branches, short-circuit operators and loops.
//!
//! Conditional jumps peek at the condition instead of consuming it, so every
//! branch starts with a `POP` of the tested value:
//! ```text
//!     <cond>
//!     JUMP_UNLESS else
//!     POP
//!     <then>
//!     JUMP end
//! else:
//!     POP
//!     <else>
//! end:
//! ```

use super::bytecode::BytecodeCompiler;
use super::emitter::JumpLabel;
use super::error::{CompileError, CompileErrorKind};
use super::fold;
use crate::ast::{Block, Loc, LogicalOp, Node};
use crate::vm::Opcode;

/// Jumps waiting for the end (`break`) or the continue point (`next`) of
/// the innermost loop.
#[derive(Debug)]
pub(crate) struct LoopContext {
    /// Scope depth outside the loop; `break`/`next` release everything
    /// above it.
    depth: usize,
    breaks: Vec<JumpLabel>,
    nexts: Vec<JumpLabel>,
}

impl<'a, 'c> BytecodeCompiler<'a, 'c> {
    pub(super) fn patch_all(&mut self, labels: Vec<JumpLabel>, loc: &Loc) -> Result<(), CompileError> {
        for label in labels {
            self.emitter.patch_jump(label, loc)?;
        }
        Ok(())
    }

    pub(super) fn compile_if(
        &mut self,
        cond: &'a Node<'a>,
        then_branch: Block<'a>,
        else_branch: Option<Block<'a>>,
        negate: bool,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        if let Some(value) = self.fold(cond) {
            // Only the live branch is emitted.
            if value.is_truthy() != negate {
                self.compile_body(then_branch, loc);
            } else {
                match else_branch {
                    Some(else_branch) => self.compile_body(else_branch, loc),
                    None => self.emitter.emit_op(loc, Opcode::Nil),
                }
            }
            return Ok(());
        }

        self.compile_expr(cond)?;
        let skip = if negate { Opcode::JumpIf } else { Opcode::JumpUnless };
        let else_label = self.emitter.emit_jump(loc, skip);
        self.emitter.emit_op(loc, Opcode::Pop);
        self.compile_body(then_branch, loc);
        let end = self.emitter.emit_jump(loc, Opcode::Jump);

        self.emitter.patch_jump(else_label, loc)?;
        self.emitter.emit_op(loc, Opcode::Pop);
        match else_branch {
            Some(else_branch) => self.compile_body(else_branch, loc),
            None => self.emitter.emit_op(loc, Opcode::Nil),
        }
        self.emitter.patch_jump(end, loc)
    }

    /// `&&`, `||` and `??` leave the deciding operand on the stack.
    pub(super) fn compile_logical(
        &mut self,
        op: LogicalOp,
        left: &'a Node<'a>,
        right: &'a Node<'a>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        if let Some(value) = self.fold(left) {
            return if fold::logical_short_circuits(op, &value) {
                self.emit_value(loc, value)
            } else {
                self.compile_expr(right)
            };
        }

        self.compile_expr(left)?;
        let end = self.emitter.emit_jump(loc, short_circuit_jump(op));
        self.emitter.emit_op(loc, Opcode::Pop);
        self.compile_expr(right)?;
        self.emitter.patch_jump(end, loc)
    }

    // === Loops ===

    fn push_loop(&mut self) {
        self.loops.push(LoopContext {
            depth: self.scopes.depth(),
            breaks: Vec::new(),
            nexts: Vec::new(),
        });
    }

    /// Patch the innermost loop's `next` jumps to the current offset and
    /// hand back its `break` jumps.
    fn pop_loop(&mut self, loc: &Loc) -> Result<Vec<JumpLabel>, CompileError> {
        let Some(context) = self.loops.pop() else {
            return Ok(Vec::new());
        };
        self.patch_all(context.nexts, loc)?;
        Ok(context.breaks)
    }

    /// `loop { ... }` only ends through `break`; its value is the break
    /// value.
    pub(super) fn compile_loop(&mut self, body: Block<'a>, loc: &Loc) -> Result<(), CompileError> {
        self.push_loop();
        self.scopes.enter_scope();
        let start = self.emitter.offset();
        self.compile_statements(body, loc);
        self.emitter.emit_op(loc, Opcode::Pop);
        let breaks = self.pop_loop(loc)?;
        self.emit_loop_back(start, loc)?;
        self.close_endless_loop(breaks, loc)
    }

    /// `while`/`until`. Evaluates to `nil` unless left with `break value`.
    pub(super) fn compile_while(
        &mut self,
        cond: &'a Node<'a>,
        body: Block<'a>,
        negate: bool,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        if let Some(value) = self.fold(cond)
            && value.is_truthy() == negate
        {
            self.emitter.emit_op(loc, Opcode::Nil);
            return Ok(());
        }

        self.push_loop();
        self.scopes.enter_scope();
        let start = self.emitter.offset();
        self.compile_expr(cond)?;
        let exit_jump = if negate { Opcode::JumpIf } else { Opcode::JumpUnless };
        let exit = self.emitter.emit_jump(loc, exit_jump);
        self.emitter.emit_op(loc, Opcode::Pop);
        self.compile_statements(body, loc);
        self.emitter.emit_op(loc, Opcode::Pop);
        let breaks = self.pop_loop(loc)?;
        self.emit_loop_back(start, loc)?;
        self.finish_conditional_loop(exit, breaks, loc)
    }

    /// C-style `for (init; cond; step)`. The init declarations live in the
    /// loop's scope.
    pub(super) fn compile_for(
        &mut self,
        init: Option<&'a Node<'a>>,
        cond: Option<&'a Node<'a>>,
        step: Option<&'a Node<'a>>,
        body: Block<'a>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        self.push_loop();
        self.scopes.enter_scope();
        if let Some(init) = init {
            self.compile_expr(init)?;
            self.emitter.emit_op(loc, Opcode::Pop);
        }

        let start = self.emitter.offset();
        let exit = match cond {
            Some(cond) => {
                self.compile_expr(cond)?;
                let exit = self.emitter.emit_jump(loc, Opcode::JumpUnless);
                self.emitter.emit_op(loc, Opcode::Pop);
                Some(exit)
            }
            None => None,
        };
        self.compile_statements(body, loc);
        self.emitter.emit_op(loc, Opcode::Pop);
        let breaks = self.pop_loop(loc)?;
        if let Some(step) = step {
            self.compile_expr(step)?;
            self.emitter.emit_op(loc, Opcode::Pop);
        }
        self.emit_loop_back(start, loc)?;
        match exit {
            Some(exit) => self.finish_conditional_loop(exit, breaks, loc),
            None => self.close_endless_loop(breaks, loc),
        }
    }

    /// `for x in iter`. The iterator lives in an anonymous slot of the loop
    /// scope.
    pub(super) fn compile_for_in(
        &mut self,
        var: &'a str,
        iter: &'a Node<'a>,
        body: Block<'a>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        self.push_loop();
        self.scopes.enter_scope();
        let (iterator, slot) = self.begin_iteration(var, iter, loc)?;

        let start = self.emitter.offset();
        self.emit_get_local(loc, iterator);
        let done = self.emitter.emit_jump(loc, Opcode::ForIn);
        self.emit_set_local(loc, slot);
        self.emitter.emit_op(loc, Opcode::Pop);
        self.compile_statements(body, loc);
        self.emitter.emit_op(loc, Opcode::Pop);
        let breaks = self.pop_loop(loc)?;
        self.emit_loop_back(start, loc)?;

        self.emitter.patch_jump(done, loc)?;
        self.emitter.emit_op(loc, Opcode::Nil);
        self.scopes.leave_scope(&mut self.emitter, loc);
        self.patch_all(breaks, loc)
    }

    /// Store the iterator of `iter` in an anonymous slot and declare the
    /// loop variable. Returns both slots.
    pub(super) fn begin_iteration(
        &mut self,
        var: &'a str,
        iter: &'a Node<'a>,
        loc: &Loc,
    ) -> Result<(u32, u32), CompileError> {
        self.compile_expr(iter)?;
        self.emitter.emit_op(loc, Opcode::GetIterator);
        let iterator = self.scopes.define_anonymous(loc)?;
        self.emit_set_local(loc, iterator);
        self.emitter.emit_op(loc, Opcode::Pop);
        let slot = self.scopes.define_local(var, false, true, loc)?;
        Ok((iterator, slot))
    }

    fn emit_loop_back(&mut self, start: usize, loc: &Loc) -> Result<(), CompileError> {
        self.emitter.emit_loop(loc, start)
    }

    /// Exit path of `while` and `for`: drop the failed condition, yield
    /// `nil`, and release the loop scope (which `break` already did on its
    /// own path).
    fn finish_conditional_loop(
        &mut self,
        exit: JumpLabel,
        breaks: Vec<JumpLabel>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        self.emitter.patch_jump(exit, loc)?;
        self.emitter.emit_op(loc, Opcode::Pop);
        self.emitter.emit_op(loc, Opcode::Nil);
        self.scopes.leave_scope(&mut self.emitter, loc);
        self.patch_all(breaks, loc)
    }

    /// A loop without an exit condition is only left through `break`,
    /// which releases the loop scope itself.
    fn close_endless_loop(&mut self, breaks: Vec<JumpLabel>, loc: &Loc) -> Result<(), CompileError> {
        let outer = self.scopes.depth() - 1;
        self.scopes.truncate(outer);
        self.patch_all(breaks, loc)
    }

    pub(super) fn compile_break(
        &mut self,
        value: Option<&'a Node<'a>>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let depth = self.loops.last().map(|context| context.depth);
        match value {
            Some(value) => self.compile_expr(value)?,
            None => self.emitter.emit_op(loc, Opcode::Nil),
        }
        let Some(depth) = depth else {
            // The break value stays behind as the expression's value.
            let error = self.error(CompileErrorKind::BreakOutsideLoop("break"), loc);
            self.record(error);
            return Ok(());
        };
        self.scopes.emit_leave_from(&mut self.emitter, depth, loc);
        let label = self.emitter.emit_jump(loc, Opcode::Jump);
        if let Some(context) = self.loops.last_mut() {
            context.breaks.push(label);
        }
        Ok(())
    }

    /// `next` pushes nothing at runtime; the value it pretends to push only
    /// keeps the statement sequence balanced and is never reached.
    pub(super) fn compile_next(&mut self, loc: &Loc) -> Result<(), CompileError> {
        let Some(depth) = self.loops.last().map(|context| context.depth) else {
            self.recover(CompileErrorKind::BreakOutsideLoop("next"), loc);
            return Ok(());
        };
        // Release scopes opened inside the body; the loop scope itself is
        // kept for the next iteration.
        self.scopes.emit_leave_from(&mut self.emitter, depth + 1, loc);
        let label = self.emitter.emit_jump(loc, Opcode::Jump);
        if let Some(context) = self.loops.last_mut() {
            context.nexts.push(label);
        }
        Ok(())
    }
}

fn short_circuit_jump(op: LogicalOp) -> Opcode {
    match op {
        LogicalOp::And => Opcode::JumpUnless,
        LogicalOp::Or => Opcode::JumpIf,
        LogicalOp::Coalesce => Opcode::JumpIfNotNil,
    }
}
