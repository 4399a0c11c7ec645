//! Pattern matching: `switch` cases and destructuring declarations.
//!
//! Every pattern test runs against the scrutinee on top of the stack and
//! pushes whether it matched, leaving the scrutinee in place:
//! `[..., s] -> [..., s, matched]`. Bindings are stored into locals of the
//! current scope as the test goes, so a failed match may leave some of them
//! assigned.
//!
//! Container patterns check the kind, then the length, then each element.
//! Every failure jumps to a common exit with `false` on top:
//! ```text
//! [a, 0]
//!     DUP; GET_CONST ListMixin; IS_A
//!     JUMP_UNLESS fail; POP
//!     DUP; CALL_METHOD size 0; LOAD 2; EQUAL
//!     JUMP_UNLESS fail; POP
//!     DUP; LOAD 0; SUBSCRIPT; SET_LOCAL a; POP
//!     DUP; LOAD 1; SUBSCRIPT; <0 test>; POP_SKIP_ONE
//!     JUMP_UNLESS fail; POP
//!     TRUE
//! fail:
//! ```

use super::bytecode::{BytecodeCompiler, comparison_opcode};
use super::collections::distinct;
use super::emitter::JumpLabel;
use super::error::{CompileError, CompileErrorKind};
use super::fold::const_path;
use crate::ast::{
    Block, Case, ComparisonOp, ContainerKind, Entry, EntryKey, Loc, Node, Pattern, PatternKind,
    Rest,
};
use crate::values::Value;
use crate::vm::{Family, Opcode};

impl<'a, 'c> BytecodeCompiler<'a, 'c> {
    /// Record an ill-formed pattern. It never matches: `[s] -> [s, false]`.
    fn reject_pattern(&mut self, what: &'static str, loc: &Loc) {
        let error = self.error(CompileErrorKind::IllegalPattern(what), loc);
        self.record(error);
        self.emitter.emit_op(loc, Opcode::False);
    }

    /// `[..., s] -> [..., s, matched]`. Bindings are `val`s unless `mutable`.
    pub(super) fn compile_pattern(
        &mut self,
        pattern: &'a Pattern<'a>,
        mutable: bool,
    ) -> Result<(), CompileError> {
        let loc = &pattern.loc;
        match &pattern.kind {
            PatternKind::Literal(node) => {
                self.emitter.emit_op(loc, Opcode::Dup);
                self.compile_expr(node)?;
                self.emitter.emit_op(loc, Opcode::Equal);
            }
            PatternKind::Regex(node) => {
                self.emitter.emit_op(loc, Opcode::Dup);
                self.compile_expr(node)?;
                self.emit_call_method(loc, "matches", 1);
            }
            PatternKind::Range(node) => {
                // range.contains(s)
                self.emitter.emit_op(loc, Opcode::Dup);
                self.compile_expr(node)?;
                self.emitter.emit_op(loc, Opcode::Swap);
                self.emit_call_method(loc, "contains", 1);
            }
            PatternKind::Compare { op, operand } => self.compile_compare_pattern(*op, operand, loc)?,
            PatternKind::And(patterns) => {
                let Some((last, init)) = patterns.split_last() else {
                    self.emitter.emit_op(loc, Opcode::True);
                    return Ok(());
                };
                let mut ends = Vec::with_capacity(init.len());
                for pattern in init {
                    self.compile_pattern(pattern, mutable)?;
                    ends.push(self.emitter.emit_jump(loc, Opcode::JumpUnless));
                    self.emitter.emit_op(loc, Opcode::Pop);
                }
                self.compile_pattern(last, mutable)?;
                self.patch_all(ends, loc)?;
            }
            PatternKind::Bind(name) => {
                let slot = self.scopes.define_local(name, !mutable, true, loc)?;
                self.emit_set_local(loc, slot);
                self.emitter.emit_op(loc, Opcode::True);
            }
            PatternKind::Wildcard => self.emitter.emit_op(loc, Opcode::True),
            PatternKind::Container {
                kind: kind @ (ContainerKind::List | ContainerKind::Tuple),
                elements,
                rest,
                entries,
            } => {
                if !entries.is_empty() {
                    self.reject_pattern("keyed entries in a positional pattern", loc);
                    return Ok(());
                }
                self.compile_sequence_pattern(*kind, elements, *rest, mutable, loc)?;
            }
            PatternKind::Container {
                kind: ContainerKind::Set,
                elements,
                rest,
                ..
            } => self.compile_set_pattern(elements, *rest, mutable, loc)?,
            PatternKind::Container {
                kind,
                elements,
                rest,
                entries,
            } => {
                if !elements.is_empty() {
                    self.reject_pattern("positional elements in a keyed pattern", loc);
                    return Ok(());
                }
                self.compile_keyed_pattern(*kind, entries, *rest, mutable, loc)?;
            }
            PatternKind::Object { class, attributes } => {
                self.compile_object_pattern(class, attributes, mutable, loc)?;
            }
        }
        Ok(())
    }

    /// `< x`, `== x`, `=~ x`, … with the scrutinee on the left.
    ///
    /// Ordering tests only run when both sides can be ordered; anything else
    /// is a failed match rather than a runtime error.
    fn compile_compare_pattern(
        &mut self,
        op: ComparisonOp,
        operand: &'a Node<'a>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let opcode = comparison_opcode(op);
        if !op.is_ordering() {
            self.emitter.emit_op(loc, Opcode::Dup);
            self.compile_expr(operand)?;
            self.emitter.emit_op(loc, opcode);
            return Ok(());
        }

        if let Some(value) = self.fold(operand) {
            // The operand's class is known: check the scrutinee against it.
            let class = self.symbol(value.class_name());
            self.emitter.emit_op(loc, Opcode::Dup);
            self.emitter.emit_get_mod_const(loc, class);
            self.emitter.emit_op(loc, Opcode::IsA);
            let end = self.emitter.emit_jump(loc, Opcode::JumpUnless);
            self.emitter.emit_op(loc, Opcode::Pop);
            self.emitter.emit_op(loc, Opcode::Dup);
            self.emit_value(loc, value)?;
            self.emitter.emit_op(loc, opcode);
            return self.emitter.patch_jump(end, loc);
        }

        // [s] -> [s, s, x] -> [s, s, x, s, x] -> [s, s, x, ok]
        self.emitter.emit_op(loc, Opcode::Dup);
        self.compile_expr(operand)?;
        self.emitter.emit_op(loc, Opcode::Dup2);
        self.emitter.emit_op(loc, Opcode::IsComparable);
        let fail = self.emitter.emit_jump(loc, Opcode::JumpUnless);
        self.emitter.emit_op(loc, Opcode::Pop);
        self.emitter.emit_op(loc, opcode);
        let end = self.emitter.emit_jump(loc, Opcode::Jump);
        // [s, s, x, false] -> [s, false]
        self.emitter.patch_jump(fail, loc)?;
        self.emitter.emit_op(loc, Opcode::PopSkipOne);
        self.emitter.emit_op(loc, Opcode::PopSkipOne);
        self.emitter.patch_jump(end, loc)
    }

    /// `[s] -> [s, is_a]` for the mixin or class constant `name`.
    fn emit_is_a(&mut self, name: &str, loc: &Loc) {
        let class = self.symbol(name);
        self.emitter.emit_op(loc, Opcode::Dup);
        self.emitter.emit_get_mod_const(loc, class);
        self.emitter.emit_op(loc, Opcode::IsA);
    }

    /// After a test: on `false` go to `fails`, otherwise drop the result.
    fn fail_unless(&mut self, fails: &mut Vec<JumpLabel>, loc: &Loc) {
        fails.push(self.emitter.emit_jump(loc, Opcode::JumpUnless));
        self.emitter.emit_op(loc, Opcode::Pop);
    }

    /// Size check that leaves `[s]` on success; at least `len` with a rest.
    fn emit_size_check(
        &mut self,
        len: usize,
        at_least: bool,
        fails: &mut Vec<JumpLabel>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        self.emitter.emit_op(loc, Opcode::Dup);
        self.emit_call_method(loc, "size", 0);
        self.emit_value(loc, Value::int(len as i64))?;
        let opcode = if at_least {
            Opcode::GreaterEqual
        } else {
            Opcode::Equal
        };
        self.emitter.emit_op(loc, opcode);
        self.fail_unless(fails, loc);
        Ok(())
    }

    /// Match an extracted element: `[s, e] -> [s]`, or jump to `fails`
    /// with `[s, false]`.
    fn match_element(
        &mut self,
        pattern: &'a Pattern<'a>,
        mutable: bool,
        fails: &mut Vec<JumpLabel>,
    ) -> Result<(), CompileError> {
        let loc = &pattern.loc;
        match &pattern.kind {
            PatternKind::Wildcard => self.emitter.emit_op(loc, Opcode::Pop),
            PatternKind::Bind(name) => self.bind_element(name, mutable, loc)?,
            _ => {
                self.compile_pattern(pattern, mutable)?;
                self.emitter.emit_op(loc, Opcode::PopSkipOne);
                self.fail_unless(fails, loc);
            }
        }
        Ok(())
    }

    /// `[s, e] -> [s]`, storing `e` in a new local.
    fn bind_element(&mut self, name: &'a str, mutable: bool, loc: &Loc) -> Result<(), CompileError> {
        let slot = self.scopes.define_local(name, !mutable, true, loc)?;
        self.emit_set_local(loc, slot);
        self.emitter.emit_op(loc, Opcode::Pop);
        Ok(())
    }

    /// Close a container pattern: success pushes `true`, failures land
    /// after it with `false` already on the stack.
    fn finish_container(&mut self, fails: Vec<JumpLabel>, loc: &Loc) -> Result<(), CompileError> {
        self.emitter.emit_op(loc, Opcode::True);
        self.patch_all(fails, loc)
    }

    fn compile_sequence_pattern(
        &mut self,
        kind: ContainerKind,
        elements: &'a [&'a Pattern<'a>],
        rest: Option<Rest<'a>>,
        mutable: bool,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let lead = match rest {
            Some(rest) if rest.position > elements.len() => {
                self.reject_pattern("rest position out of bounds", loc);
                return Ok(());
            }
            Some(rest) => rest.position,
            None => elements.len(),
        };
        let trail = elements.len() - lead;

        let mut fails = Vec::new();
        self.emit_is_a(kind.mixin(), loc);
        self.fail_unless(&mut fails, loc);
        self.emit_size_check(elements.len(), rest.is_some(), &mut fails, loc)?;

        for (i, element) in elements[..lead].iter().enumerate() {
            if matches!(element.kind, PatternKind::Wildcard) {
                continue;
            }
            self.emitter.emit_op(loc, Opcode::Dup);
            self.emit_value(loc, Value::int(i as i64))?;
            self.emitter.emit_op(loc, Opcode::Subscript);
            self.match_element(element, mutable, &mut fails)?;
        }
        for (j, element) in elements[lead..].iter().enumerate() {
            if matches!(element.kind, PatternKind::Wildcard) {
                continue;
            }
            // s[s.size - k]
            self.emitter.emit_op(loc, Opcode::Dup);
            self.emitter.emit_op(loc, Opcode::Dup);
            self.emit_call_method(loc, "size", 0);
            self.emit_value(loc, Value::int((trail - j) as i64))?;
            self.emitter.emit_op(loc, Opcode::Sub);
            self.emitter.emit_op(loc, Opcode::Subscript);
            self.match_element(element, mutable, &mut fails)?;
        }

        if let Some(Rest {
            name: Some(name), ..
        }) = rest
        {
            self.collect_rest(kind, name, lead, trail, mutable, loc)?;
        }
        self.finish_container(fails, loc)
    }

    /// Copy `s[lead .. s.size - trail]` into a new collection bound to
    /// `name`. `[s] -> [s]`.
    fn collect_rest(
        &mut self,
        kind: ContainerKind,
        name: &'a str,
        lead: usize,
        trail: usize,
        mutable: bool,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let source = self.scopes.define_anonymous(loc)?;
        let index = self.scopes.define_anonymous(loc)?;
        let end = self.scopes.define_anonymous(loc)?;

        self.emit_set_local(loc, source);
        self.emitter.emit_op(loc, Opcode::Dup);
        self.emit_call_method(loc, "size", 0);
        if trail > 0 {
            self.emit_value(loc, Value::int(trail as i64))?;
            self.emitter.emit_op(loc, Opcode::Sub);
        }
        self.emit_set_local(loc, end);
        self.emitter.emit_op(loc, Opcode::Pop);
        self.emit_value(loc, Value::int(lead as i64))?;
        self.emit_set_local(loc, index);
        self.emitter.emit_op(loc, Opcode::Pop);

        let family = match kind {
            ContainerKind::Tuple => Family::NewTuple,
            _ => Family::NewList,
        };
        self.emitter.emit_family(loc, family, &[0]);

        // [s, acc]
        let start = self.emitter.offset();
        self.emit_get_local(loc, index);
        self.emit_get_local(loc, end);
        self.emitter.emit_op(loc, Opcode::Less);
        let done = self.emitter.emit_jump(loc, Opcode::JumpUnless);
        self.emitter.emit_op(loc, Opcode::Pop);
        self.emit_get_local(loc, source);
        self.emit_get_local(loc, index);
        self.emitter.emit_op(loc, Opcode::Subscript);
        self.emitter.emit_op(loc, Opcode::Append);
        self.emit_get_local(loc, index);
        self.emit_value(loc, Value::int(1))?;
        self.emitter.emit_op(loc, Opcode::Add);
        self.emit_set_local(loc, index);
        self.emitter.emit_op(loc, Opcode::Pop);
        self.emitter.emit_loop(loc, start)?;

        self.emitter.patch_jump(done, loc)?;
        self.emitter.emit_op(loc, Opcode::Pop);
        self.bind_element(name, mutable, loc)
    }

    /// Set patterns hold literal elements only; each must be contained in
    /// the scrutinee. Repeated literals count once.
    fn compile_set_pattern(
        &mut self,
        elements: &'a [&'a Pattern<'a>],
        rest: Option<Rest<'a>>,
        mutable: bool,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let mut literals = Vec::with_capacity(elements.len());
        let mut seen = Vec::new();
        let mut legal = true;
        for element in elements {
            let PatternKind::Literal(node) = element.kind else {
                let error = self.error(
                    CompileErrorKind::IllegalPattern("set patterns may only hold literals"),
                    &element.loc,
                );
                self.record(error);
                legal = false;
                continue;
            };
            match self.fold(node) {
                Some(value) if seen.contains(&value) => {}
                Some(value) => {
                    seen.push(value);
                    literals.push(node);
                }
                None => literals.push(node),
            }
        }
        if !legal {
            self.emitter.emit_op(loc, Opcode::False);
            return Ok(());
        }

        if rest.is_none() {
            let values: Option<Vec<Value>> = literals.iter().map(|node| self.fold(node)).collect();
            if let Some(values) = values {
                self.emitter.emit_op(loc, Opcode::Dup);
                self.emitter.emit_constant(loc, Value::Set(distinct(values)))?;
                self.emitter.emit_op(loc, Opcode::LaxEqual);
                return Ok(());
            }
        }

        let mut fails = Vec::new();
        self.emit_is_a(ContainerKind::Set.mixin(), loc);
        self.fail_unless(&mut fails, loc);
        self.emit_size_check(literals.len(), rest.is_some(), &mut fails, loc)?;
        for node in &literals {
            self.emitter.emit_op(loc, Opcode::Dup);
            self.compile_expr(node)?;
            self.emit_call_method(loc, "contains", 1);
            self.fail_unless(&mut fails, loc);
        }

        if let Some(Rest {
            name: Some(name), ..
        }) = rest
        {
            // s - %{elements}
            self.emitter.emit_op(loc, Opcode::Dup);
            self.emitter
                .emit_family(loc, Family::NewSet, &[literals.len() as u32]);
            for node in &literals {
                self.compile_expr(node)?;
                self.emitter.emit_op(loc, Opcode::Append);
            }
            self.emitter.emit_op(loc, Opcode::Sub);
            self.bind_element(name, mutable, loc)?;
        }
        self.finish_container(fails, loc)
    }

    /// Map and record patterns. A map rest collects the entries not named
    /// by the pattern.
    fn compile_keyed_pattern(
        &mut self,
        kind: ContainerKind,
        entries: &'a [Entry<'a>],
        rest: Option<Rest<'a>>,
        mutable: bool,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        if kind == ContainerKind::Record && rest.is_some() {
            self.reject_pattern("record patterns cannot have a rest", loc);
            return Ok(());
        }
        // The rest is collected by `except`, one argument per key.
        let collects = matches!(rest, Some(Rest { name: Some(_), .. }));
        if collects && entries.len() > usize::from(u8::MAX) {
            return Err(self.error(CompileErrorKind::TooManyArguments, loc));
        }

        let mut fails = Vec::new();
        self.emit_is_a(kind.mixin(), loc);
        self.fail_unless(&mut fails, loc);
        for entry in entries {
            self.emitter.emit_op(loc, Opcode::Dup);
            self.emit_entry_key(&entry.key, loc)?;
            self.emitter.emit_op(loc, Opcode::Subscript);
            self.match_entry(entry, mutable, &mut fails, loc)?;
        }

        if let Some(Rest {
            name: Some(name), ..
        }) = rest
        {
            self.emitter.emit_op(loc, Opcode::Dup);
            for entry in entries {
                self.emit_entry_key(&entry.key, loc)?;
            }
            self.emit_call_method(loc, "except", entries.len() as u32);
            self.bind_element(name, mutable, loc)?;
        }
        self.finish_container(fails, loc)
    }

    fn emit_entry_key(&mut self, key: &'a EntryKey<'a>, loc: &Loc) -> Result<(), CompileError> {
        match key {
            EntryKey::Name(name) => self.emit_value(loc, Value::symbol(*name)),
            EntryKey::Expr(node) => self.compile_expr(node),
        }
    }

    /// `[s, v] -> [s]` for an entry's sub-pattern; shorthand entries bind
    /// the key's name.
    fn match_entry(
        &mut self,
        entry: &'a Entry<'a>,
        mutable: bool,
        fails: &mut Vec<JumpLabel>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        match (&entry.key, entry.pattern) {
            (_, Some(pattern)) => self.match_element(pattern, mutable, fails),
            (EntryKey::Name(name), None) => self.bind_element(name, mutable, loc),
            (EntryKey::Expr(_), None) => {
                // [s, v] -> [s]
                let error = self.error(
                    CompileErrorKind::IllegalPattern("shorthand entries need a name key"),
                    loc,
                );
                self.record(error);
                self.emitter.emit_op(loc, Opcode::Pop);
                Ok(())
            }
        }
    }

    /// `Point(x:, y: > 0)`: class check, then one getter call per attribute.
    fn compile_object_pattern(
        &mut self,
        class: &'a [&'a str],
        attributes: &'a [Entry<'a>],
        mutable: bool,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let mut fails = Vec::new();
        self.emit_is_a(&const_path(class), loc);
        self.fail_unless(&mut fails, loc);
        for attribute in attributes {
            let EntryKey::Name(name) = attribute.key else {
                let error = self.error(
                    CompileErrorKind::IllegalPattern("object attributes must be names"),
                    loc,
                );
                self.record(error);
                continue;
            };
            self.emitter.emit_op(loc, Opcode::Dup);
            self.emit_call_method(loc, name, 0);
            self.match_entry(attribute, mutable, &mut fails, loc)?;
        }
        self.finish_container(fails, loc)
    }

    // === Statements using patterns ===

    /// `val <pattern> = value`. A failed match raises; the value is the
    /// statement's result.
    pub(super) fn compile_destructure(
        &mut self,
        pattern: &'a Pattern<'a>,
        value: &'a Node<'a>,
        mutable: bool,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        self.compile_expr(value)?;
        self.compile_pattern(pattern, mutable)?;
        let matched = self.emitter.emit_jump(loc, Opcode::JumpIf);
        self.emitter.emit_op(loc, Opcode::NoMatch);
        self.emitter.patch_jump(matched, loc)?;
        self.emitter.emit_op(loc, Opcode::Pop);
        Ok(())
    }

    /// Cases are tried in order. Each case has its own scope for the
    /// pattern's bindings:
    /// ```text
    ///     <scrutinee>
    ///     <pattern>               [s, matched]
    ///     JUMP_UNLESS next
    ///     POP; POP
    ///     <body>
    ///     LEAVE_SCOPE; JUMP end
    /// next:
    ///     POP; LEAVE_SCOPE
    ///     ... next case ...
    ///     POP
    ///     <else or nil>
    /// end:
    /// ```
    pub(super) fn compile_switch(
        &mut self,
        scrutinee: &'a Node<'a>,
        cases: &'a [Case<'a>],
        else_branch: Option<Block<'a>>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let known = self.fold(scrutinee);
        self.compile_expr(scrutinee)?;

        let mut ends = Vec::new();
        let mut exhausted = false;
        for case in cases {
            match self.fold_case(known.as_ref(), case) {
                Some(false) => continue,
                Some(true) => {
                    self.emitter.emit_op(&case.loc, Opcode::Pop);
                    self.compile_body(case.body, &case.loc);
                    exhausted = true;
                    break;
                }
                None => {}
            }

            let depth = self.scopes.depth();
            self.scopes.enter_scope();
            self.compile_pattern(case.pattern, false)?;
            let guard_failed = match case.guard {
                Some(guard) => {
                    let failed = self.emitter.emit_jump(&case.loc, Opcode::JumpUnless);
                    self.emitter.emit_op(&case.loc, Opcode::Pop);
                    self.compile_expr(guard)?;
                    Some(failed)
                }
                None => None,
            };
            let next = self.emitter.emit_jump(&case.loc, Opcode::JumpUnless);
            self.emitter.emit_op(&case.loc, Opcode::Pop);
            self.emitter.emit_op(&case.loc, Opcode::Pop);
            self.compile_statements(case.body, &case.loc);
            self.scopes.emit_leave_from(&mut self.emitter, depth, &case.loc);
            ends.push(self.emitter.emit_jump(&case.loc, Opcode::Jump));

            if let Some(failed) = guard_failed {
                self.emitter.patch_jump(failed, &case.loc)?;
            }
            self.emitter.patch_jump(next, &case.loc)?;
            self.emitter.emit_op(&case.loc, Opcode::Pop);
            self.scopes.leave_scope(&mut self.emitter, &case.loc);
        }

        if !exhausted {
            self.emitter.emit_op(loc, Opcode::Pop);
            match else_branch {
                Some(body) => self.compile_body(body, loc),
                None => self.emitter.emit_op(loc, Opcode::Nil),
            }
        }
        self.patch_all(ends, loc)
    }

    /// Decide a case at compile time: a wildcard always matches, and a
    /// literal is compared with a known scalar scrutinee of the same class.
    fn fold_case(&self, scrutinee: Option<&Value>, case: &Case<'_>) -> Option<bool> {
        if case.guard.is_some() {
            return None;
        }
        match case.pattern.kind {
            PatternKind::Wildcard => Some(true),
            PatternKind::Literal(node) => {
                let scrutinee = scrutinee?;
                let value = self.fold(node)?;
                let comparable = scrutinee.is_scalar()
                    && value.is_scalar()
                    && scrutinee.class_name() == value.class_name();
                comparable.then(|| *scrutinee == value)
            }
            _ => None,
        }
    }
}
