use super::{ComparisonOp, ContainerKind, Loc, Node};

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern<'a> {
    pub kind: PatternKind<'a>,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind<'a> {
    /// Matches values equal to the expression (usually a literal).
    Literal(&'a Node<'a>),
    /// Matches values contained in the range expression.
    Range(&'a Node<'a>),
    /// Matches strings accepted by the regex expression.
    Regex(&'a Node<'a>),
    /// `< 0`, `== x`, `=~ re`, …
    Compare {
        op: ComparisonOp,
        operand: &'a Node<'a>,
    },
    /// `p1 && p2 && …`
    And(&'a [&'a Pattern<'a>]),
    /// Binds the scrutinee to a new local.
    Bind(&'a str),
    /// `_`
    Wildcard,
    /// `[a, *b, c]`, `(a, b)`, `%{1, 2}`, `{k: v}`, `%{name:}`.
    ///
    /// List, tuple and set patterns use `elements` and `rest`; map and
    /// record patterns use `entries` and (maps only) `rest`.
    Container {
        kind: ContainerKind,
        elements: &'a [&'a Pattern<'a>],
        rest: Option<Rest<'a>>,
        entries: &'a [Entry<'a>],
    },
    /// `Point(x:, y: > 0)`
    Object {
        class: &'a [&'a str],
        attributes: &'a [Entry<'a>],
    },
}

/// A splat inside a container pattern. `position` is the number of
/// elements written before it; `name` is `None` for an anonymous `*`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rest<'a> {
    pub name: Option<&'a str>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKey<'a> {
    Name(&'a str),
    Expr(&'a Node<'a>),
}

/// A keyed sub-pattern. Without a `pattern` the entry is shorthand: it
/// binds a local named after the key.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<'a> {
    pub key: EntryKey<'a>,
    pub pattern: Option<&'a Pattern<'a>>,
}
