use super::{
    AssignOp, BinaryOp, ComparisonOp, ContainerKind, FloatWidth, IntWidth, Loc, LogicalOp,
    Pattern, UnaryOp,
};

/// A syntax tree node, allocated in the parser's arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<'a> {
    pub kind: NodeKind<'a>,
    pub loc: Loc,
}

pub type Block<'a> = &'a [&'a Node<'a>];

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind<'a> {
    /// Root of a compilation unit.
    Program(Block<'a>),

    Nil,
    Bool(bool),
    /// Integer literal as written (without sign, prefix or suffix).
    Int {
        digits: &'a str,
        radix: u32,
        width: IntWidth,
    },
    Float {
        text: &'a str,
        width: FloatWidth,
    },
    Str(&'a str),
    Symbol(&'a str),
    /// `"a ${b} c"`
    Interpolation(&'a [StrPart<'a>]),
    /// `%/a ${b}/flags`
    Regex {
        parts: &'a [StrPart<'a>],
        flags: &'a str,
    },
    Range {
        from: &'a Node<'a>,
        to: &'a Node<'a>,
        exclusive: bool,
    },
    /// List, tuple, set, map and record literals. `capacity` is the `:N`
    /// suffix.
    Collection {
        kind: ContainerKind,
        elements: &'a [Element<'a>],
        capacity: Option<&'a Node<'a>>,
    },

    Ident(&'a str),
    SelfRef,
    /// `A::B::C`
    ConstRef(&'a [&'a str]),

    /// `val x = v`, `var x`, …
    Declare {
        name: &'a str,
        mutable: bool,
        value: Option<&'a Node<'a>>,
    },
    /// `val [a, *b] = v`
    Destructure {
        pattern: &'a Pattern<'a>,
        value: &'a Node<'a>,
        mutable: bool,
    },
    Assign {
        op: AssignOp,
        target: &'a Node<'a>,
        value: &'a Node<'a>,
    },

    Unary {
        op: UnaryOp,
        operand: &'a Node<'a>,
    },
    Binary {
        op: BinaryOp,
        left: &'a Node<'a>,
        right: &'a Node<'a>,
    },
    Comparison {
        op: ComparisonOp,
        left: &'a Node<'a>,
        right: &'a Node<'a>,
    },
    Logical {
        op: LogicalOp,
        left: &'a Node<'a>,
        right: &'a Node<'a>,
    },

    /// `f(args)` where `f` evaluates to a callable.
    Call {
        callee: &'a Node<'a>,
        args: &'a [Arg<'a>],
    },
    /// `recv.name(args)`; `Foo.new(...)` instantiates.
    MethodCall {
        receiver: &'a Node<'a>,
        method: &'a str,
        args: &'a [Arg<'a>],
    },
    Subscript {
        target: &'a Node<'a>,
        index: &'a Node<'a>,
    },
    /// `recv.name` (getter call).
    Attribute {
        target: &'a Node<'a>,
        name: &'a str,
    },

    Do(Block<'a>),
    /// `if`/`unless` (with `negate`) and modifier-if.
    If {
        cond: &'a Node<'a>,
        then_branch: Block<'a>,
        else_branch: Option<Block<'a>>,
        negate: bool,
    },
    Switch {
        scrutinee: &'a Node<'a>,
        cases: &'a [Case<'a>],
        else_branch: Option<Block<'a>>,
    },
    Loop(Block<'a>),
    /// `while`/`until` (with `negate`).
    While {
        cond: &'a Node<'a>,
        body: Block<'a>,
        negate: bool,
    },
    /// `for (init; cond; step)`
    For {
        init: Option<&'a Node<'a>>,
        cond: Option<&'a Node<'a>>,
        step: Option<&'a Node<'a>>,
        body: Block<'a>,
    },
    ForIn {
        var: &'a str,
        iter: &'a Node<'a>,
        body: Block<'a>,
    },
    Break(Option<&'a Node<'a>>),
    Next,
    Return(Option<&'a Node<'a>>),

    Function(&'a FunctionDef<'a>),
    Class {
        name: &'a str,
        methods: &'a [FunctionDef<'a>],
    },

    /// A construct the parser recognized but this compiler has no lowering
    /// for.
    Unsupported(&'a str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrPart<'a> {
    Lit(&'a str),
    Expr(&'a Node<'a>),
}

/// One element of a collection literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Element<'a> {
    Item(&'a Node<'a>),
    Keyed {
        key: &'a Node<'a>,
        value: &'a Node<'a>,
    },
    /// `elem if cond` / `elem unless cond`
    If {
        cond: &'a Node<'a>,
        negate: bool,
        element: &'a Element<'a>,
    },
    /// `elem for x in iter`
    For {
        var: &'a str,
        iter: &'a Node<'a>,
        element: &'a Element<'a>,
    },
}

impl Element<'_> {
    /// Conditional and loop elements make the literal's size unknown.
    pub fn is_generated(&self) -> bool {
        matches!(self, Element::If { .. } | Element::For { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg<'a> {
    pub name: Option<&'a str>,
    pub value: &'a Node<'a>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case<'a> {
    pub pattern: &'a Pattern<'a>,
    pub guard: Option<&'a Node<'a>>,
    pub body: Block<'a>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef<'a> {
    pub name: Option<&'a str>,
    pub params: &'a [&'a str],
    pub body: Block<'a>,
    pub loc: Loc,
}

impl<'a> Node<'a> {
    pub fn line(&self) -> u32 {
        self.loc.line
    }

    /// Short name of the node kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Program(_) => "program",
            NodeKind::Nil => "nil",
            NodeKind::Bool(_) => "boolean",
            NodeKind::Int { .. } => "integer",
            NodeKind::Float { .. } => "float",
            NodeKind::Str(_) => "string",
            NodeKind::Symbol(_) => "symbol",
            NodeKind::Interpolation(_) => "interpolation",
            NodeKind::Regex { .. } => "regex",
            NodeKind::Range { .. } => "range",
            NodeKind::Collection { .. } => "collection",
            NodeKind::Ident(_) => "identifier",
            NodeKind::SelfRef => "self",
            NodeKind::ConstRef(_) => "constant",
            NodeKind::Declare { .. } => "declaration",
            NodeKind::Destructure { .. } => "destructuring declaration",
            NodeKind::Assign { .. } => "assignment",
            NodeKind::Unary { .. } => "unary operation",
            NodeKind::Binary { .. } => "binary operation",
            NodeKind::Comparison { .. } => "comparison",
            NodeKind::Logical { .. } => "logical operation",
            NodeKind::Call { .. } => "call",
            NodeKind::MethodCall { .. } => "method call",
            NodeKind::Subscript { .. } => "subscript",
            NodeKind::Attribute { .. } => "attribute",
            NodeKind::Do(_) => "do block",
            NodeKind::If { .. } => "if",
            NodeKind::Switch { .. } => "switch",
            NodeKind::Loop(_) => "loop",
            NodeKind::While { .. } => "while",
            NodeKind::For { .. } => "for",
            NodeKind::ForIn { .. } => "for-in",
            NodeKind::Break(_) => "break",
            NodeKind::Next => "next",
            NodeKind::Return(_) => "return",
            NodeKind::Function(_) => "function",
            NodeKind::Class { .. } => "class",
            NodeKind::Unsupported(_) => "unsupported construct",
        }
    }
}
