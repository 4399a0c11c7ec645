//! Arena builder for syntax trees.
//!
//! Parsers (and tests) construct trees through this builder so every node
//! lives in the same `Bump` arena and carries its source line.

use bumpalo::Bump;

use super::{
    Arg, AssignOp, BinaryOp, Block, Case, ComparisonOp, ContainerKind, Element, Entry, EntryKey,
    FloatWidth, FunctionDef, IntWidth, Loc, LogicalOp, Node, NodeKind, Pattern, PatternKind, Rest,
    StrPart, UnaryOp,
};

/// Allocates nodes in an arena.
///
/// The builder is `Copy`; `at(line)` returns a builder stamping a different
/// line on the nodes it creates.
///
/// # Example
///
/// ```
/// use cinder_core::ast::AstBuilder;
/// use bumpalo::Bump;
///
/// let arena = Bump::new();
/// let b = AstBuilder::new(&arena);
/// let sum = b.add(b.int("1"), b.at(2).int("2"));
/// assert_eq!(sum.loc.line, 1);
/// ```
#[derive(Copy, Clone, Debug)]
pub struct AstBuilder<'a> {
    arena: &'a Bump,
    line: u32,
}

impl<'a> AstBuilder<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self { arena, line: 1 }
    }

    pub fn at(self, line: u32) -> Self {
        Self { line, ..self }
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }

    fn loc(&self) -> Loc {
        Loc::line(self.line)
    }

    pub fn node(&self, kind: NodeKind<'a>) -> &'a Node<'a> {
        self.arena.alloc(Node {
            kind,
            loc: self.loc(),
        })
    }

    pub fn block(&self, nodes: &[&'a Node<'a>]) -> Block<'a> {
        self.arena.alloc_slice_copy(nodes)
    }

    pub fn str_slice(&self, items: &[&str]) -> &'a [&'a str] {
        let owned: Vec<&'a str> = items.iter().map(|s| self.name(s)).collect();
        self.arena.alloc_slice_copy(&owned)
    }

    fn name(&self, name: &str) -> &'a str {
        self.arena.alloc_str(name)
    }

    // === Literals ===

    pub fn program(&self, statements: &[&'a Node<'a>]) -> &'a Node<'a> {
        self.node(NodeKind::Program(self.block(statements)))
    }

    pub fn nil(&self) -> &'a Node<'a> {
        self.node(NodeKind::Nil)
    }

    pub fn bool(&self, value: bool) -> &'a Node<'a> {
        self.node(NodeKind::Bool(value))
    }

    /// Decimal `I64` literal.
    pub fn int(&self, digits: &str) -> &'a Node<'a> {
        self.int_with(digits, 10, IntWidth::I64)
    }

    pub fn int_with(&self, digits: &str, radix: u32, width: IntWidth) -> &'a Node<'a> {
        self.node(NodeKind::Int {
            digits: self.name(digits),
            radix,
            width,
        })
    }

    pub fn float(&self, text: &str) -> &'a Node<'a> {
        self.float_with(text, FloatWidth::F64)
    }

    pub fn float_with(&self, text: &str, width: FloatWidth) -> &'a Node<'a> {
        self.node(NodeKind::Float {
            text: self.name(text),
            width,
        })
    }

    pub fn str(&self, value: &str) -> &'a Node<'a> {
        self.node(NodeKind::Str(self.name(value)))
    }

    pub fn sym(&self, value: &str) -> &'a Node<'a> {
        self.node(NodeKind::Symbol(self.name(value)))
    }

    pub fn lit_part(&self, text: &str) -> StrPart<'a> {
        StrPart::Lit(self.name(text))
    }

    pub fn interpolation(&self, parts: Vec<StrPart<'a>>) -> &'a Node<'a> {
        self.node(NodeKind::Interpolation(
            self.arena.alloc_slice_fill_iter(parts),
        ))
    }

    pub fn regex(&self, parts: Vec<StrPart<'a>>, flags: &str) -> &'a Node<'a> {
        self.node(NodeKind::Regex {
            parts: self.arena.alloc_slice_fill_iter(parts),
            flags: self.name(flags),
        })
    }

    pub fn range(&self, from: &'a Node<'a>, to: &'a Node<'a>, exclusive: bool) -> &'a Node<'a> {
        self.node(NodeKind::Range {
            from,
            to,
            exclusive,
        })
    }

    // === Collections ===

    pub fn collection(
        &self,
        kind: ContainerKind,
        elements: Vec<Element<'a>>,
        capacity: Option<&'a Node<'a>>,
    ) -> &'a Node<'a> {
        self.node(NodeKind::Collection {
            kind,
            elements: self.arena.alloc_slice_fill_iter(elements),
            capacity,
        })
    }

    pub fn list(&self, items: &[&'a Node<'a>]) -> &'a Node<'a> {
        self.items(ContainerKind::List, items)
    }

    pub fn tuple(&self, items: &[&'a Node<'a>]) -> &'a Node<'a> {
        self.items(ContainerKind::Tuple, items)
    }

    pub fn set(&self, items: &[&'a Node<'a>]) -> &'a Node<'a> {
        self.items(ContainerKind::Set, items)
    }

    fn items(&self, kind: ContainerKind, items: &[&'a Node<'a>]) -> &'a Node<'a> {
        let elements = items.iter().map(|item| Element::Item(*item)).collect();
        self.collection(kind, elements, None)
    }

    pub fn map(&self, entries: &[(&'a Node<'a>, &'a Node<'a>)]) -> &'a Node<'a> {
        let elements = entries
            .iter()
            .map(|&(key, value)| Element::Keyed { key, value })
            .collect();
        self.collection(ContainerKind::Map, elements, None)
    }

    pub fn record(&self, fields: &[(&str, &'a Node<'a>)]) -> &'a Node<'a> {
        let elements = fields
            .iter()
            .map(|&(name, value)| Element::Keyed {
                key: self.sym(name),
                value,
            })
            .collect();
        self.collection(ContainerKind::Record, elements, None)
    }

    pub fn elem_if(&self, cond: &'a Node<'a>, negate: bool, element: Element<'a>) -> Element<'a> {
        Element::If {
            cond,
            negate,
            element: self.arena.alloc(element),
        }
    }

    pub fn elem_for(&self, var: &str, iter: &'a Node<'a>, element: Element<'a>) -> Element<'a> {
        Element::For {
            var: self.name(var),
            iter,
            element: self.arena.alloc(element),
        }
    }

    // === Names ===

    pub fn ident(&self, name: &str) -> &'a Node<'a> {
        self.node(NodeKind::Ident(self.name(name)))
    }

    pub fn self_ref(&self) -> &'a Node<'a> {
        self.node(NodeKind::SelfRef)
    }

    pub fn const_ref(&self, path: &[&str]) -> &'a Node<'a> {
        self.node(NodeKind::ConstRef(self.str_slice(path)))
    }

    pub fn val(&self, name: &str, value: &'a Node<'a>) -> &'a Node<'a> {
        self.declare(name, false, Some(value))
    }

    pub fn var(&self, name: &str, value: Option<&'a Node<'a>>) -> &'a Node<'a> {
        self.declare(name, true, value)
    }

    pub fn declare(&self, name: &str, mutable: bool, value: Option<&'a Node<'a>>) -> &'a Node<'a> {
        self.node(NodeKind::Declare {
            name: self.name(name),
            mutable,
            value,
        })
    }

    pub fn destructure(
        &self,
        pattern: &'a Pattern<'a>,
        value: &'a Node<'a>,
        mutable: bool,
    ) -> &'a Node<'a> {
        self.node(NodeKind::Destructure {
            pattern,
            value,
            mutable,
        })
    }

    pub fn assign(&self, op: AssignOp, target: &'a Node<'a>, value: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::Assign { op, target, value })
    }

    // === Operators ===

    pub fn unary(&self, op: UnaryOp, operand: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::Unary { op, operand })
    }

    pub fn binary(&self, op: BinaryOp, left: &'a Node<'a>, right: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::Binary { op, left, right })
    }

    pub fn add(&self, left: &'a Node<'a>, right: &'a Node<'a>) -> &'a Node<'a> {
        self.binary(BinaryOp::Add, left, right)
    }

    pub fn compare(
        &self,
        op: ComparisonOp,
        left: &'a Node<'a>,
        right: &'a Node<'a>,
    ) -> &'a Node<'a> {
        self.node(NodeKind::Comparison { op, left, right })
    }

    pub fn logical(&self, op: LogicalOp, left: &'a Node<'a>, right: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::Logical { op, left, right })
    }

    // === Calls ===

    pub fn arg(&self, value: &'a Node<'a>) -> Arg<'a> {
        Arg { name: None, value }
    }

    pub fn named_arg(&self, name: &str, value: &'a Node<'a>) -> Arg<'a> {
        Arg {
            name: Some(self.name(name)),
            value,
        }
    }

    pub fn call(&self, callee: &'a Node<'a>, args: Vec<Arg<'a>>) -> &'a Node<'a> {
        self.node(NodeKind::Call {
            callee,
            args: self.arena.alloc_slice_fill_iter(args),
        })
    }

    pub fn method_call(
        &self,
        receiver: &'a Node<'a>,
        method: &str,
        args: Vec<Arg<'a>>,
    ) -> &'a Node<'a> {
        self.node(NodeKind::MethodCall {
            receiver,
            method: self.name(method),
            args: self.arena.alloc_slice_fill_iter(args),
        })
    }

    pub fn subscript(&self, target: &'a Node<'a>, index: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::Subscript { target, index })
    }

    pub fn attribute(&self, target: &'a Node<'a>, name: &str) -> &'a Node<'a> {
        self.node(NodeKind::Attribute {
            target,
            name: self.name(name),
        })
    }

    // === Control flow ===

    pub fn do_block(&self, body: &[&'a Node<'a>]) -> &'a Node<'a> {
        self.node(NodeKind::Do(self.block(body)))
    }

    pub fn if_(
        &self,
        cond: &'a Node<'a>,
        then_branch: &[&'a Node<'a>],
        else_branch: Option<&[&'a Node<'a>]>,
    ) -> &'a Node<'a> {
        self.node(NodeKind::If {
            cond,
            then_branch: self.block(then_branch),
            else_branch: else_branch.map(|b| self.block(b)),
            negate: false,
        })
    }

    pub fn unless(
        &self,
        cond: &'a Node<'a>,
        then_branch: &[&'a Node<'a>],
        else_branch: Option<&[&'a Node<'a>]>,
    ) -> &'a Node<'a> {
        self.node(NodeKind::If {
            cond,
            then_branch: self.block(then_branch),
            else_branch: else_branch.map(|b| self.block(b)),
            negate: true,
        })
    }

    pub fn case(
        &self,
        pattern: &'a Pattern<'a>,
        guard: Option<&'a Node<'a>>,
        body: &[&'a Node<'a>],
    ) -> Case<'a> {
        Case {
            pattern,
            guard,
            body: self.block(body),
            loc: self.loc(),
        }
    }

    pub fn switch(
        &self,
        scrutinee: &'a Node<'a>,
        cases: Vec<Case<'a>>,
        else_branch: Option<&[&'a Node<'a>]>,
    ) -> &'a Node<'a> {
        self.node(NodeKind::Switch {
            scrutinee,
            cases: self.arena.alloc_slice_fill_iter(cases),
            else_branch: else_branch.map(|b| self.block(b)),
        })
    }

    pub fn loop_(&self, body: &[&'a Node<'a>]) -> &'a Node<'a> {
        self.node(NodeKind::Loop(self.block(body)))
    }

    pub fn while_(&self, cond: &'a Node<'a>, body: &[&'a Node<'a>], negate: bool) -> &'a Node<'a> {
        self.node(NodeKind::While {
            cond,
            body: self.block(body),
            negate,
        })
    }

    pub fn for_(
        &self,
        init: Option<&'a Node<'a>>,
        cond: Option<&'a Node<'a>>,
        step: Option<&'a Node<'a>>,
        body: &[&'a Node<'a>],
    ) -> &'a Node<'a> {
        self.node(NodeKind::For {
            init,
            cond,
            step,
            body: self.block(body),
        })
    }

    pub fn for_in(&self, var: &str, iter: &'a Node<'a>, body: &[&'a Node<'a>]) -> &'a Node<'a> {
        self.node(NodeKind::ForIn {
            var: self.name(var),
            iter,
            body: self.block(body),
        })
    }

    pub fn break_(&self, value: Option<&'a Node<'a>>) -> &'a Node<'a> {
        self.node(NodeKind::Break(value))
    }

    pub fn next(&self) -> &'a Node<'a> {
        self.node(NodeKind::Next)
    }

    pub fn return_(&self, value: Option<&'a Node<'a>>) -> &'a Node<'a> {
        self.node(NodeKind::Return(value))
    }

    // === Definitions ===

    pub fn function_def(
        &self,
        name: Option<&str>,
        params: &[&str],
        body: &[&'a Node<'a>],
    ) -> FunctionDef<'a> {
        FunctionDef {
            name: name.map(|n| self.name(n)),
            params: self.str_slice(params),
            body: self.block(body),
            loc: self.loc(),
        }
    }

    pub fn function(
        &self,
        name: Option<&str>,
        params: &[&str],
        body: &[&'a Node<'a>],
    ) -> &'a Node<'a> {
        let def = self.function_def(name, params, body);
        self.node(NodeKind::Function(self.arena.alloc(def)))
    }

    pub fn class(&self, name: &str, methods: Vec<FunctionDef<'a>>) -> &'a Node<'a> {
        self.node(NodeKind::Class {
            name: self.name(name),
            methods: self.arena.alloc_slice_fill_iter(methods),
        })
    }

    pub fn unsupported(&self, what: &str) -> &'a Node<'a> {
        self.node(NodeKind::Unsupported(self.name(what)))
    }

    // === Patterns ===

    pub fn pattern(&self, kind: PatternKind<'a>) -> &'a Pattern<'a> {
        self.arena.alloc(Pattern {
            kind,
            loc: self.loc(),
        })
    }

    pub fn p_lit(&self, node: &'a Node<'a>) -> &'a Pattern<'a> {
        self.pattern(PatternKind::Literal(node))
    }

    pub fn p_range(&self, node: &'a Node<'a>) -> &'a Pattern<'a> {
        self.pattern(PatternKind::Range(node))
    }

    pub fn p_regex(&self, node: &'a Node<'a>) -> &'a Pattern<'a> {
        self.pattern(PatternKind::Regex(node))
    }

    pub fn p_cmp(&self, op: ComparisonOp, operand: &'a Node<'a>) -> &'a Pattern<'a> {
        self.pattern(PatternKind::Compare { op, operand })
    }

    pub fn p_and(&self, patterns: &[&'a Pattern<'a>]) -> &'a Pattern<'a> {
        self.pattern(PatternKind::And(self.arena.alloc_slice_copy(patterns)))
    }

    pub fn p_bind(&self, name: &str) -> &'a Pattern<'a> {
        self.pattern(PatternKind::Bind(self.name(name)))
    }

    pub fn p_wild(&self) -> &'a Pattern<'a> {
        self.pattern(PatternKind::Wildcard)
    }

    /// Positional container pattern; `rest` is `(position, name)`.
    pub fn p_seq(
        &self,
        kind: ContainerKind,
        elements: &[&'a Pattern<'a>],
        rest: Option<(usize, Option<&str>)>,
    ) -> &'a Pattern<'a> {
        self.pattern(PatternKind::Container {
            kind,
            elements: self.arena.alloc_slice_copy(elements),
            rest: rest.map(|(position, name)| Rest {
                name: name.map(|n| self.name(n)),
                position,
            }),
            entries: &[],
        })
    }

    pub fn p_list(
        &self,
        elements: &[&'a Pattern<'a>],
        rest: Option<(usize, Option<&str>)>,
    ) -> &'a Pattern<'a> {
        self.p_seq(ContainerKind::List, elements, rest)
    }

    pub fn entry(&self, key: &str, pattern: Option<&'a Pattern<'a>>) -> Entry<'a> {
        Entry {
            key: EntryKey::Name(self.name(key)),
            pattern,
        }
    }

    pub fn keyed_entry(&self, key: &'a Node<'a>, pattern: &'a Pattern<'a>) -> Entry<'a> {
        Entry {
            key: EntryKey::Expr(key),
            pattern: Some(pattern),
        }
    }

    pub fn p_keyed(
        &self,
        kind: ContainerKind,
        entries: Vec<Entry<'a>>,
        rest: Option<&str>,
    ) -> &'a Pattern<'a> {
        self.pattern(PatternKind::Container {
            kind,
            elements: &[],
            rest: rest.map(|name| Rest {
                name: Some(self.name(name)),
                position: 0,
            }),
            entries: self.arena.alloc_slice_fill_iter(entries),
        })
    }

    pub fn p_object(&self, class: &[&str], attributes: Vec<Entry<'a>>) -> &'a Pattern<'a> {
        self.pattern(PatternKind::Object {
            class: self.str_slice(class),
            attributes: self.arena.alloc_slice_fill_iter(attributes),
        })
    }
}
