// Common syntax structures shared by expression and pattern nodes.

use core::fmt;
use core::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Span(pub Range<usize>);

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self(start..end)
    }
    pub fn combine(a: &Span, b: &Span) -> Span {
        Span::new(a.0.start, b.0.end)
    }
    pub fn str_of<'a>(&self, source: &'a str) -> &'a str {
        &source[self.0.start..self.0.end]
    }
}

/// Source position of a node: the line used for line-info runs and the
/// byte span used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Loc {
    pub line: u32,
    pub span: Span,
}

impl Loc {
    pub fn new(line: u32, span: Span) -> Self {
        Self { line, span }
    }

    pub fn line(line: u32) -> Self {
        Self {
            line,
            span: Span::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNeq,
    /// `=~`
    Match,
    /// `!~`
    NotMatch,
}

impl ComparisonOp {
    /// Ordering comparisons need both sides to be of a comparable class.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            ComparisonOp::Lt | ComparisonOp::Le | ComparisonOp::Gt | ComparisonOp::Ge
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::StrictEq => "===",
            ComparisonOp::StrictNeq => "!==",
            ComparisonOp::Match => "=~",
            ComparisonOp::NotMatch => "!~",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&&`
    And,
    /// `||`
    Or,
    /// `??`
    Coalesce,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

/// Assignment operators: `=`, `:=`, the eleven arithmetic/bitwise
/// compounds (`+=` … `>>=`) and the short-circuit `||=`, `&&=`, `??=`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Declare,
    Compound(BinaryOp),
    Or,
    And,
    Coalesce,
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignOp::Set => write!(f, "="),
            AssignOp::Declare => write!(f, ":="),
            AssignOp::Compound(op) => write!(f, "{}=", op.symbol()),
            AssignOp::Or => write!(f, "||="),
            AssignOp::And => write!(f, "&&="),
            AssignOp::Coalesce => write!(f, "??="),
        }
    }
}

/// Integer literal width, selected by the literal's suffix.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    /// The unsuffixed `Int`. Literals and folded results that leave the
    /// 64-bit range become big integers.
    I64,
    U8,
    U16,
    U32,
    U64,
    /// Unbounded (`n` suffix).
    Big,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FloatWidth {
    F32,
    F64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    List,
    Tuple,
    Set,
    Map,
    Record,
}

impl ContainerKind {
    /// Whether runtime code may mutate a value of this kind. Pooled
    /// constants of mutable kinds are copied before use.
    pub fn is_mutable(self) -> bool {
        matches!(
            self,
            ContainerKind::List | ContainerKind::Set | ContainerKind::Map
        )
    }

    /// Name of the mixin constant every value of this kind includes.
    pub fn mixin(self) -> &'static str {
        match self {
            ContainerKind::List => "ListMixin",
            ContainerKind::Tuple => "TupleMixin",
            ContainerKind::Set => "SetMixin",
            ContainerKind::Map => "MapMixin",
            ContainerKind::Record => "RecordMixin",
        }
    }
}
