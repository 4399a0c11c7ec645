//! Declarations and assignments.
//!
//! Every form leaves the assigned value on the stack. Short-circuit
//! assignments (`||=`, `&&=`, `??=`) leave the old value when they skip the
//! store.

use ecow::EcoString;

use super::bytecode::{BytecodeCompiler, binary_opcode};
use super::error::{CompileError, CompileErrorKind};
use super::fold::const_path;
use crate::ast::{AssignOp, Loc, Node, NodeKind};
use crate::vm::Opcode;

impl<'a, 'c> BytecodeCompiler<'a, 'c> {
    /// `val x = v`, `var x = v`, `var x`.
    ///
    /// The value is compiled before the name is declared, so `val x = x`
    /// reads an outer `x`.
    pub(super) fn compile_declare(
        &mut self,
        name: &'a str,
        mutable: bool,
        value: Option<&'a Node<'a>>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        match value {
            Some(value) => {
                self.compile_expr(value)?;
                match self.scopes.define_local(name, !mutable, true, loc) {
                    Ok(slot) => self.emit_set_local(loc, slot),
                    Err(err) => self.record(err),
                }
            }
            None => {
                if let Err(err) = self.scopes.define_local(name, !mutable, false, loc) {
                    self.record(err);
                }
                self.emitter.emit_op(loc, Opcode::Nil);
            }
        }
        Ok(())
    }

    /// Record a rejected store and compile its value in its place.
    fn reject(
        &mut self,
        kind: CompileErrorKind,
        value: &'a Node<'a>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let error = self.error(kind, loc);
        self.record(error);
        self.compile_expr(value)
    }

    pub(super) fn compile_assign(
        &mut self,
        op: AssignOp,
        target: &'a Node<'a>,
        value: &'a Node<'a>,
        top_level: bool,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        match (&target.kind, op) {
            (NodeKind::Ident(name), AssignOp::Declare) => {
                self.compile_declare(name, true, Some(value), loc)
            }
            (_, AssignOp::Declare) => self.reject(
                CompileErrorKind::IllegalOperator {
                    op: ":=".into(),
                    target: target.kind_name(),
                },
                value,
                loc,
            ),
            (NodeKind::Ident(name), op) => self.assign_local(name, op, value, loc),
            (NodeKind::Subscript { target, index }, op) => {
                self.assign_subscript(target, index, op, value, loc)
            }
            (NodeKind::Attribute { target, name }, op) => {
                self.assign_attribute(target, name, op, value, loc)
            }
            (NodeKind::ConstRef(path), AssignOp::Set) => {
                self.assign_constant(const_path(path), value, top_level, loc)
            }
            (NodeKind::ConstRef(path), _) => {
                self.reject(CompileErrorKind::ReassignedConstant(const_path(path)), value, loc)
            }
            _ => self.reject(
                CompileErrorKind::InvalidAssignmentTarget(target.kind_name()),
                value,
                loc,
            ),
        }
    }

    fn assign_local(
        &mut self,
        name: &'a str,
        op: AssignOp,
        value: &'a Node<'a>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let Some(local) = self.scopes.lookup(name) else {
            return self.reject(CompileErrorKind::UndeclaredVariable(name.into()), value, loc);
        };

        if op == AssignOp::Set {
            if local.single_assignment && local.initialized {
                return self.reject(CompileErrorKind::ReassignedVal(name.into()), value, loc);
            }
            self.compile_expr(value)?;
            self.emit_set_local(loc, local.slot);
            self.scopes.mark_initialized(name);
            return Ok(());
        }

        // Read-modify-write forms need an initialized, reassignable local.
        let local = match self.scopes.resolve_local(name, loc) {
            Ok(local) => local,
            Err(err) => return self.reject(err.kind, value, loc),
        };
        if local.single_assignment {
            return self.reject(CompileErrorKind::ReassignedVal(name.into()), value, loc);
        }
        self.emit_get_local(loc, local.slot);
        match op {
            AssignOp::Compound(binary) => {
                self.compile_expr(value)?;
                self.emitter.emit_op(loc, binary_opcode(binary));
                self.emit_set_local(loc, local.slot);
            }
            _ => {
                let keep = self.emitter.emit_jump(loc, keep_jump(op));
                self.emitter.emit_op(loc, Opcode::Pop);
                self.compile_expr(value)?;
                self.emit_set_local(loc, local.slot);
                self.emitter.patch_jump(keep, loc)?;
            }
        }
        Ok(())
    }

    /// `coll[i] = v`. `SUBSCRIPT_SET` leaves `v`.
    fn assign_subscript(
        &mut self,
        target: &'a Node<'a>,
        index: &'a Node<'a>,
        op: AssignOp,
        value: &'a Node<'a>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        self.compile_expr(target)?;
        self.compile_expr(index)?;
        match op {
            AssignOp::Set => {
                self.compile_expr(value)?;
                self.emitter.emit_op(loc, Opcode::SubscriptSet);
            }
            AssignOp::Compound(binary) => {
                self.emitter.emit_op(loc, Opcode::Dup2);
                self.emitter.emit_op(loc, Opcode::Subscript);
                self.compile_expr(value)?;
                self.emitter.emit_op(loc, binary_opcode(binary));
                self.emitter.emit_op(loc, Opcode::SubscriptSet);
            }
            _ => {
                self.emitter.emit_op(loc, Opcode::Dup2);
                self.emitter.emit_op(loc, Opcode::Subscript);
                let keep = self.emitter.emit_jump(loc, keep_jump(op));
                self.emitter.emit_op(loc, Opcode::Pop);
                self.compile_expr(value)?;
                self.emitter.emit_op(loc, Opcode::SubscriptSet);
                let end = self.emitter.emit_jump(loc, Opcode::Jump);
                // [coll, index, old] -> [old]
                self.emitter.patch_jump(keep, loc)?;
                self.emitter.emit_op(loc, Opcode::PopSkipOne);
                self.emitter.emit_op(loc, Opcode::PopSkipOne);
                self.emitter.patch_jump(end, loc)?;
            }
        }
        Ok(())
    }

    /// `obj.name = v` calls the `name=` setter, which returns `v`.
    fn assign_attribute(
        &mut self,
        target: &'a Node<'a>,
        name: &'a str,
        op: AssignOp,
        value: &'a Node<'a>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let setter = setter_name(name);
        self.compile_expr(target)?;
        match op {
            AssignOp::Set => {
                self.compile_expr(value)?;
                self.emit_call_method(loc, &setter, 1);
            }
            AssignOp::Compound(binary) => {
                self.emitter.emit_op(loc, Opcode::Dup);
                self.emit_call_method(loc, name, 0);
                self.compile_expr(value)?;
                self.emitter.emit_op(loc, binary_opcode(binary));
                self.emit_call_method(loc, &setter, 1);
            }
            _ => {
                self.emitter.emit_op(loc, Opcode::Dup);
                self.emit_call_method(loc, name, 0);
                let keep = self.emitter.emit_jump(loc, keep_jump(op));
                self.emitter.emit_op(loc, Opcode::Pop);
                self.compile_expr(value)?;
                self.emit_call_method(loc, &setter, 1);
                let end = self.emitter.emit_jump(loc, Opcode::Jump);
                self.emitter.patch_jump(keep, loc)?;
                self.emitter.emit_op(loc, Opcode::PopSkipOne);
                self.emitter.patch_jump(end, loc)?;
            }
        }
        Ok(())
    }

    /// `Name = v`. A constant is assigned once per module. Its value is only
    /// remembered for folding when the assignment runs unconditionally, that
    /// is, as a statement at the top of the program.
    fn assign_constant(
        &mut self,
        path: EcoString,
        value: &'a Node<'a>,
        top_level: bool,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        if self.module_constants.borrow().contains_key(&path) {
            return self.reject(CompileErrorKind::ReassignedConstant(path), value, loc);
        }
        let folded = if top_level { self.fold(value) } else { None };
        self.compile_expr(value)?;
        let symbol = self.symbol(&path);
        self.emitter.emit_set_mod_const(loc, symbol);
        self.module_constants.borrow_mut().insert(path, folded);
        Ok(())
    }
}

/// Jump taken when a short-circuit assignment keeps the current value.
fn keep_jump(op: AssignOp) -> Opcode {
    match op {
        AssignOp::And => Opcode::JumpUnless,
        AssignOp::Coalesce => Opcode::JumpIfNotNil,
        _ => Opcode::JumpIf,
    }
}

fn setter_name(name: &str) -> EcoString {
    let mut setter = EcoString::from(name);
    setter.push('=');
    setter
}
