//! Bytecode compiler implementation.

use core::cell::RefCell;

use tracing::{debug, warn};

use super::control_flow::LoopContext;
use super::emitter::Emitter;
use super::error::{CompileError, CompileErrorKind};
use super::fold::{self, ModuleConstants, const_path};
use crate::api::{CompilationOptions, Error};
use crate::ast::{BinaryOp, ComparisonOp, Loc, Node, NodeKind, StrPart, UnaryOp};
use crate::scope_stack::ScopeStack;
use crate::values::{FloatValue, Symbol, Value};
use crate::vm::{Family, Function, Opcode, SourceLocation};

/// Result of compiling a program: the main function and every error found.
///
/// The function is always produced; it is only safe to run when `errors` is
/// empty.
#[derive(Debug)]
pub struct Compilation {
    pub function: Function,
    pub errors: Vec<CompileError>,
}

impl Compilation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Function, Error> {
        if self.errors.is_empty() {
            Ok(self.function)
        } else {
            Err(Error::Compilation {
                diagnostics: self.errors.iter().map(CompileError::to_diagnostic).collect(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FunctionKind {
    Program,
    Function,
}

/// Compiles one function body. Nested definitions get their own compiler
/// sharing the options and the module constant table.
pub struct BytecodeCompiler<'a, 'c> {
    pub(super) options: &'c CompilationOptions<'c>,
    /// Constants assigned so far, across all functions of the module.
    pub(super) module_constants: &'c RefCell<ModuleConstants>,
    pub(super) emitter: Emitter,
    pub(super) scopes: ScopeStack<'a>,
    pub(super) loops: Vec<LoopContext>,
    pub(super) errors: Vec<CompileError>,
    pub(super) kind: FunctionKind,
    /// Set while compiling a statement directly at the program's top level.
    pub(super) top_level: bool,
}

impl<'a, 'c> BytecodeCompiler<'a, 'c> {
    pub(super) fn new(
        name: &str,
        location: SourceLocation,
        options: &'c CompilationOptions<'c>,
        module_constants: &'c RefCell<ModuleConstants>,
        kind: FunctionKind,
    ) -> Self {
        Self {
            options,
            module_constants,
            emitter: Emitter::new(name, location),
            scopes: ScopeStack::new(),
            loops: Vec::new(),
            errors: Vec::new(),
            kind,
            top_level: false,
        }
    }

    /// Compile a program. A root that is not a `Program` node is compiled
    /// as a program with a single statement.
    pub fn compile_program(program: &'a Node<'a>, options: &CompilationOptions<'_>) -> Compilation {
        let module_constants = RefCell::new(ModuleConstants::new());
        let location = options.location(&program.loc);
        let mut compiler = BytecodeCompiler::new(
            "<main>",
            location,
            options,
            &module_constants,
            FunctionKind::Program,
        );
        debug!(source = %options.source_name, "Compiling program");

        match &program.kind {
            NodeKind::Program(body) => compiler.compile_statements(body, &program.loc),
            _ => compiler.compile_statements(core::slice::from_ref(&program), &program.loc),
        }
        compiler.emitter.emit_op(&program.loc, Opcode::Return);

        let (function, errors) = compiler.finish();
        debug!(
            bytes = function.code.len(),
            constants = function.constants.len(),
            errors = errors.len(),
            "Compiled program"
        );
        Compilation { function, errors }
    }

    /// Reserve the frame and hand out the finished function.
    pub(super) fn finish(mut self) -> (Function, Vec<CompileError>) {
        debug_assert!(
            !self.errors.is_empty() || self.emitter.unpatched() == 0,
            "unpatched jumps"
        );
        self.scopes.prep_locals(&mut self.emitter);
        let frame_size = self.scopes.frame_size();
        let mut function = self.emitter.finish();
        function.frame_size = frame_size;
        (function, self.errors)
    }

    pub(super) fn record(&mut self, error: CompileError) {
        warn!(line = error.location.line, error = %error.kind, "Compile error");
        self.errors.push(error);
    }

    pub(super) fn error(&self, kind: CompileErrorKind, loc: &Loc) -> CompileError {
        CompileError::new(kind, loc)
    }

    /// Record an error and push `nil` where the failed value would be, so
    /// the enclosing expression keeps compiling.
    pub(super) fn recover(&mut self, kind: CompileErrorKind, loc: &Loc) {
        let error = self.error(kind, loc);
        self.record(error);
        self.emitter.emit_op(loc, Opcode::Nil);
    }

    pub(super) fn symbol(&self, name: &str) -> Symbol {
        self.options.symbols.intern(name)
    }

    /// Static value of `node`, if folding is enabled and it has one.
    pub(super) fn fold(&self, node: &Node<'_>) -> Option<Value> {
        if !self.options.fold_constants {
            return None;
        }
        fold::resolve(node, &*self.module_constants.borrow())
    }

    /// Push a compile-time value.
    pub(super) fn emit_value(&mut self, loc: &Loc, value: Value) -> Result<(), CompileError> {
        match value {
            Value::Nil => self.emitter.emit_op(loc, Opcode::Nil),
            Value::Bool(true) => self.emitter.emit_op(loc, Opcode::True),
            Value::Bool(false) => self.emitter.emit_op(loc, Opcode::False),
            value => {
                // Pooled collections are shared by every run of the code.
                let copy = value.is_mutable();
                self.emitter.emit_constant(loc, value)?;
                if copy {
                    self.emitter.emit_op(loc, Opcode::Copy);
                }
            }
        }
        Ok(())
    }

    pub(super) fn emit_get_local(&mut self, loc: &Loc, slot: u32) {
        self.emitter.emit_family(loc, Family::GetLocal, &[slot]);
    }

    pub(super) fn emit_set_local(&mut self, loc: &Loc, slot: u32) {
        self.emitter.emit_family(loc, Family::SetLocal, &[slot]);
    }

    pub(super) fn emit_call_method(&mut self, loc: &Loc, name: &str, argc: u32) {
        let symbol = self.symbol(name);
        self.emitter
            .emit(loc, Opcode::CallMethod, &[symbol.id(), argc]);
    }

    // === Statements ===

    /// Compile a statement sequence leaving exactly one value, the value of
    /// the last statement (`nil` when empty).
    ///
    /// Most errors are recovered where they occur. The ones that abort a
    /// statement are recorded here; the failed statement's partial scopes
    /// and loops are discarded and compilation moves on.
    pub(super) fn compile_statements(&mut self, statements: &[&'a Node<'a>], loc: &Loc) {
        let Some((last, init)) = statements.split_last() else {
            self.emitter.emit_op(loc, Opcode::Nil);
            return;
        };
        for statement in init {
            // A constant has no effect in statement position.
            if self.fold(statement).is_some() {
                continue;
            }
            if self.compile_statement(statement) {
                self.emitter.emit_op(&statement.loc, Opcode::Pop);
            }
        }
        if !self.compile_statement(last) {
            // Keep the stack shape so the code after stays consistent.
            self.emitter.emit_op(&last.loc, Opcode::Nil);
        }
    }

    fn compile_statement(&mut self, statement: &'a Node<'a>) -> bool {
        let depth = self.scopes.depth();
        let loops = self.loops.len();
        self.top_level = self.kind == FunctionKind::Program && depth == 1;
        match self.compile_expr(statement) {
            Ok(()) => true,
            Err(err) => {
                self.record(err);
                self.scopes.truncate(depth);
                self.loops.truncate(loops);
                false
            }
        }
    }

    /// Statements in a scope of their own.
    pub(super) fn compile_body(&mut self, body: &[&'a Node<'a>], loc: &Loc) {
        self.scopes.enter_scope();
        self.compile_statements(body, loc);
        self.scopes.leave_scope(&mut self.emitter, loc);
    }

    // === Expressions ===

    /// Compile `node` so that it pushes exactly one value.
    pub(super) fn compile_expr(&mut self, node: &'a Node<'a>) -> Result<(), CompileError> {
        let top_level = core::mem::take(&mut self.top_level);
        let loc = &node.loc;

        if let Some(value) = self.fold(node) {
            return self.emit_value(loc, value);
        }

        match &node.kind {
            NodeKind::Program(body) => {
                self.compile_statements(body, loc);
                Ok(())
            }

            NodeKind::Nil => self.emit_value(loc, Value::Nil),
            NodeKind::Bool(b) => self.emit_value(loc, Value::Bool(*b)),
            NodeKind::Int {
                digits,
                radix,
                width,
            } => match fold::parse_int(digits, *radix, *width) {
                Some(value) => self.emit_value(loc, value),
                None => {
                    self.recover(CompileErrorKind::MalformedNumber((*digits).into()), loc);
                    Ok(())
                }
            },
            NodeKind::Float { text, width } => match FloatValue::parse(text, *width) {
                Some(value) => self.emit_value(loc, Value::Float(value)),
                None => {
                    self.recover(CompileErrorKind::MalformedNumber((*text).into()), loc);
                    Ok(())
                }
            },
            NodeKind::Str(s) => self.emit_value(loc, Value::str(*s)),
            NodeKind::Symbol(s) => self.emit_value(loc, Value::symbol(*s)),
            NodeKind::Interpolation(parts) => {
                let count = self.compile_string_parts(parts, loc)?;
                self.emitter.emit(loc, Opcode::Interpolate, &[count]);
                Ok(())
            }
            NodeKind::Regex { parts, flags } => self.compile_regex(parts, flags, loc),
            NodeKind::Range {
                from,
                to,
                exclusive,
            } => {
                self.compile_expr(from)?;
                self.compile_expr(to)?;
                self.emitter
                    .emit(loc, Opcode::NewRange, &[u32::from(*exclusive)]);
                Ok(())
            }
            NodeKind::Collection {
                kind,
                elements,
                capacity,
            } => self.compile_collection(*kind, elements, *capacity, loc),

            NodeKind::Ident(name) => {
                match self.scopes.resolve_local(name, loc) {
                    Ok(local) => self.emit_get_local(loc, local.slot),
                    Err(err) => self.recover(err.kind, loc),
                }
                Ok(())
            }
            NodeKind::SelfRef => {
                self.emit_get_local(loc, 0);
                Ok(())
            }
            NodeKind::ConstRef(path) => {
                let symbol = self.symbol(&const_path(path));
                self.emitter.emit_get_mod_const(loc, symbol);
                Ok(())
            }

            NodeKind::Declare {
                name,
                mutable,
                value,
            } => self.compile_declare(name, *mutable, *value, loc),
            NodeKind::Destructure {
                pattern,
                value,
                mutable,
            } => self.compile_destructure(pattern, value, *mutable, loc),
            NodeKind::Assign { op, target, value } => {
                self.compile_assign(*op, target, value, top_level, loc)
            }

            NodeKind::Unary { op, operand } => {
                self.compile_expr(operand)?;
                self.emitter.emit_op(loc, unary_opcode(*op));
                Ok(())
            }
            NodeKind::Binary { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emitter.emit_op(loc, binary_opcode(*op));
                Ok(())
            }
            NodeKind::Comparison { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emitter.emit_op(loc, comparison_opcode(*op));
                Ok(())
            }
            NodeKind::Logical { op, left, right } => self.compile_logical(*op, left, right, loc),

            NodeKind::Call { callee, args } => self.compile_call(callee, args, loc),
            NodeKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                self.compile_expr(receiver)?;
                self.compile_method_call(method, args, loc)
            }
            NodeKind::Subscript { target, index } => {
                self.compile_expr(target)?;
                self.compile_expr(index)?;
                self.emitter.emit_op(loc, Opcode::Subscript);
                Ok(())
            }
            NodeKind::Attribute { target, name } => {
                self.compile_expr(target)?;
                self.emit_call_method(loc, name, 0);
                Ok(())
            }

            NodeKind::Do(body) => {
                self.compile_body(body, loc);
                Ok(())
            }
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
                negate,
            } => self.compile_if(cond, then_branch, *else_branch, *negate, loc),
            NodeKind::Switch {
                scrutinee,
                cases,
                else_branch,
            } => self.compile_switch(scrutinee, cases, *else_branch, loc),
            NodeKind::Loop(body) => self.compile_loop(body, loc),
            NodeKind::While { cond, body, negate } => self.compile_while(cond, body, *negate, loc),
            NodeKind::For {
                init,
                cond,
                step,
                body,
            } => self.compile_for(*init, *cond, *step, body, loc),
            NodeKind::ForIn { var, iter, body } => self.compile_for_in(var, iter, body, loc),
            NodeKind::Break(value) => self.compile_break(*value, loc),
            NodeKind::Next => self.compile_next(loc),
            NodeKind::Return(value) => {
                if self.kind == FunctionKind::Program {
                    self.recover(CompileErrorKind::ReturnOutsideFunction, loc);
                    return Ok(());
                }
                match value {
                    Some(value) => self.compile_expr(value)?,
                    None => self.emitter.emit_op(loc, Opcode::Nil),
                }
                self.emitter.emit_op(loc, Opcode::Return);
                Ok(())
            }

            NodeKind::Function(def) => self.compile_function_def(def, loc),
            NodeKind::Class { name, methods } => self.compile_class(name, methods, loc),

            NodeKind::Unsupported(what) => {
                self.recover(CompileErrorKind::Unimplemented((*what).into()), loc);
                Ok(())
            }
        }
    }

    /// Push the non-empty parts of a string; returns how many were pushed.
    fn compile_string_parts(
        &mut self,
        parts: &'a [StrPart<'a>],
        loc: &Loc,
    ) -> Result<u32, CompileError> {
        let mut count = 0u32;
        for part in parts {
            match part {
                StrPart::Lit("") => continue,
                StrPart::Lit(s) => self.emit_value(loc, Value::str(*s))?,
                StrPart::Expr(node) => self.compile_expr(node)?,
            }
            count += 1;
        }
        if count > u32::from(u8::MAX) {
            return Err(self.error(CompileErrorKind::TooManyArguments, loc));
        }
        Ok(count)
    }

    fn compile_regex(
        &mut self,
        parts: &'a [StrPart<'a>],
        flags: &str,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let flags = match fold::regex_flags(flags) {
            Ok(flags) => flags,
            Err(msg) => {
                self.recover(CompileErrorKind::MalformedRegex(msg), loc);
                return Ok(());
            }
        };

        // Literal-only sources are checked and pooled even without folding.
        let literal: Option<String> = parts
            .iter()
            .map(|part| match part {
                StrPart::Lit(s) => Some(*s),
                StrPart::Expr(_) => None,
            })
            .collect();
        if let Some(source) = literal {
            if let Err(msg) = fold::validate_regex(&source, flags) {
                self.recover(CompileErrorKind::MalformedRegex(msg), loc);
                return Ok(());
            }
            return self.emit_value(
                loc,
                Value::Regex {
                    source: source.into(),
                    flags,
                },
            );
        }

        let count = self.compile_string_parts(parts, loc)?;
        self.emitter
            .emit(loc, Opcode::NewRegex, &[u32::from(flags), count]);
        Ok(())
    }
}

pub(super) fn unary_opcode(op: UnaryOp) -> Opcode {
    match op {
        UnaryOp::Neg => Opcode::Negate,
        UnaryOp::Not => Opcode::Not,
        UnaryOp::BitNot => Opcode::BitNot,
    }
}

pub(super) fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Pow => Opcode::Pow,
        BinaryOp::BitAnd => Opcode::BitAnd,
        BinaryOp::BitOr => Opcode::BitOr,
        BinaryOp::BitXor => Opcode::BitXor,
        BinaryOp::Shl => Opcode::Shl,
        BinaryOp::Shr => Opcode::Shr,
    }
}

pub(super) fn comparison_opcode(op: ComparisonOp) -> Opcode {
    match op {
        ComparisonOp::Eq => Opcode::Equal,
        ComparisonOp::Neq => Opcode::NotEqual,
        ComparisonOp::Lt => Opcode::Less,
        ComparisonOp::Le => Opcode::LessEqual,
        ComparisonOp::Gt => Opcode::Greater,
        ComparisonOp::Ge => Opcode::GreaterEqual,
        ComparisonOp::StrictEq => Opcode::StrictEqual,
        ComparisonOp::StrictNeq => Opcode::StrictNotEqual,
        ComparisonOp::Match => Opcode::Match,
        ComparisonOp::NotMatch => Opcode::NotMatch,
    }
}
