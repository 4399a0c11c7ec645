//! Calls, function definitions and classes.

use alloc::sync::Arc;

use hashbrown::HashSet;
use tracing::debug;

use super::bytecode::{BytecodeCompiler, FunctionKind};
use super::error::{CompileError, CompileErrorKind};
use crate::ast::{Arg, FunctionDef, Loc, Node, NodeKind};
use crate::values::Value;
use crate::vm::{Function, Opcode};

impl<'a, 'c> BytecodeCompiler<'a, 'c> {
    /// Push positional arguments, then named ones followed by the tuple of
    /// their names. Returns the argument count and whether names were
    /// pushed.
    fn compile_args(&mut self, args: &'a [Arg<'a>], loc: &Loc) -> Result<(u32, bool), CompileError> {
        if args.len() > usize::from(u8::MAX) {
            return Err(self.error(CompileErrorKind::TooManyArguments, loc));
        }

        let mut names = Vec::new();
        let mut seen = HashSet::new();
        for arg in args.iter().filter(|arg| arg.name.is_none()) {
            self.compile_expr(arg.value)?;
        }
        for arg in args {
            let Some(name) = arg.name else { continue };
            if !seen.insert(name) {
                let error = self.error(CompileErrorKind::DuplicateNamedArgument(name.into()), loc);
                self.record(error);
            }
            self.compile_expr(arg.value)?;
            names.push(Value::symbol(name));
        }

        let keywords = !names.is_empty();
        if keywords {
            self.emit_value(loc, Value::Tuple(names))?;
        }
        Ok((args.len() as u32, keywords))
    }

    /// `f(args)`. A bare name that is not a local is a method of `self`.
    pub(super) fn compile_call(
        &mut self,
        callee: &'a Node<'a>,
        args: &'a [Arg<'a>],
        loc: &Loc,
    ) -> Result<(), CompileError> {
        if let NodeKind::Ident(name) = callee.kind
            && self.scopes.lookup(name).is_none()
        {
            self.emit_get_local(loc, 0);
            return self.compile_method_call(name, args, loc);
        }

        self.compile_expr(callee)?;
        let (argc, keywords) = self.compile_args(args, loc)?;
        let opcode = if keywords { Opcode::CallKw } else { Opcode::Call };
        self.emitter.emit(loc, opcode, &[argc]);
        Ok(())
    }

    /// Call `method` on the receiver already on the stack.
    pub(super) fn compile_method_call(
        &mut self,
        method: &str,
        args: &'a [Arg<'a>],
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let (argc, keywords) = self.compile_args(args, loc)?;
        let symbol = self.symbol(method);
        let opcode = if keywords {
            Opcode::CallMethodKw
        } else {
            Opcode::CallMethod
        };
        self.emitter.emit(loc, opcode, &[symbol.id(), argc]);
        Ok(())
    }

    // === Definitions ===

    /// Compile a definition into its own `Function`. Errors inside the body
    /// are merged into this compiler's list.
    fn compile_function(&mut self, def: &'a FunctionDef<'a>) -> Result<Function, CompileError> {
        if def.params.len() > usize::from(u8::MAX) {
            return Err(self.error(CompileErrorKind::TooManyArguments, &def.loc));
        }
        let name = def.name.unwrap_or("<anonymous>");
        debug!(name, arity = def.params.len(), "Compiling function");

        let location = self.options.location(&def.loc);
        let mut child = BytecodeCompiler::new(
            name,
            location,
            self.options,
            self.module_constants,
            FunctionKind::Function,
        );
        child.emitter.function_mut().arity = def.params.len() as u8;
        for &param in def.params {
            if let Err(err) = child.scopes.define_local(param, false, true, &def.loc) {
                // The argument still occupies its slot.
                child.record(err);
                child.scopes.define_anonymous(&def.loc)?;
            }
        }
        child.compile_statements(def.body, &def.loc);
        child.emitter.emit_op(&def.loc, Opcode::Return);

        let (function, errors) = child.finish();
        self.errors.extend(errors);
        Ok(function)
    }

    /// `fn name(params) { ... }` pushes the function; a named one is also
    /// bound to a `val` local.
    pub(super) fn compile_function_def(
        &mut self,
        def: &'a FunctionDef<'a>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let function = self.compile_function(def)?;
        self.emit_value(loc, Value::Function(Arc::new(function)))?;
        if let Some(name) = def.name {
            let slot = self.scopes.define_local(name, true, true, loc)?;
            self.emit_set_local(loc, slot);
        }
        Ok(())
    }

    /// `class Name { methods }` creates the class, defines each method and
    /// binds the class to the module constant `Name`.
    pub(super) fn compile_class(
        &mut self,
        name: &'a str,
        methods: &'a [FunctionDef<'a>],
        loc: &Loc,
    ) -> Result<(), CompileError> {
        if self.module_constants.borrow().contains_key(name) {
            let error = self.error(CompileErrorKind::ReassignedConstant(name.into()), loc);
            self.record(error);
        }

        let class = self.symbol(name);
        self.emitter.emit(loc, Opcode::NewClass, &[class.id()]);
        for method in methods {
            let Some(method_name) = method.name else {
                let error = self.error(
                    CompileErrorKind::Unimplemented("anonymous method".into()),
                    &method.loc,
                );
                self.record(error);
                continue;
            };
            let function = self.compile_function(method)?;
            self.emit_value(&method.loc, Value::Function(Arc::new(function)))?;
            let symbol = self.symbol(method_name);
            self.emitter
                .emit(&method.loc, Opcode::DefineMethod, &[symbol.id()]);
        }
        self.emitter.emit_set_mod_const(loc, class);
        self.module_constants.borrow_mut().insert(name.into(), None);
        Ok(())
    }
}
