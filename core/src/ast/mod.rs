//! Syntax tree consumed by the compiler.
//!
//! The tree is produced by the parser (an external collaborator) in a
//! `bumpalo` arena; nodes borrow their children from the same arena.

mod builder;
mod node;
mod pattern;
mod syntax;

pub use builder::AstBuilder;
pub use node::{Arg, Block, Case, Element, FunctionDef, Node, NodeKind, StrPart};
pub use pattern::{Entry, EntryKey, Pattern, PatternKind, Rest};
pub use syntax::{
    AssignOp, BinaryOp, ComparisonOp, ContainerKind, FloatWidth, IntWidth, Loc, LogicalOp, Span,
    UnaryOp,
};
