//! Bytecode compilation errors.

use ecow::EcoString;
use thiserror::Error;

use crate::api::{Diagnostic, Severity};
use crate::ast::Loc;

/// What went wrong. The compiler never stops at the first error: each one
/// is recorded with its location and compilation continues with the next
/// statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("'{0}' is already declared in this scope")]
    DuplicateLocal(EcoString),
    #[error("too many local variables (limit: 65535)")]
    TooManyLocals,
    #[error("too many constants (limit: 4294967295)")]
    TooManyConstants,
    #[error("jump distance too large (limit: 65535 bytes)")]
    JumpTooFar,

    #[error("undeclared variable '{0}'")]
    UndeclaredVariable(EcoString),
    #[error("'{0}' is read before it is initialized")]
    UninitializedAccess(EcoString),
    #[error("cannot reassign val '{0}'")]
    ReassignedVal(EcoString),
    #[error("constant '{0}' is already defined")]
    ReassignedConstant(EcoString),

    #[error("cannot assign to {0}")]
    InvalidAssignmentTarget(&'static str),
    #[error("operator '{op}' cannot be applied to {target}")]
    IllegalOperator { op: EcoString, target: &'static str },
    #[error("a collection with conditional or loop elements cannot declare a capacity")]
    CapacityWithConditional,
    #[error("capacity must be a non-negative integer constant")]
    InvalidCapacity,
    #[error("record keys must be symbols")]
    InvalidRecordKey,
    #[error("illegal pattern: {0}")]
    IllegalPattern(&'static str),
    #[error("named argument '{0}' is given more than once")]
    DuplicateNamedArgument(EcoString),
    #[error("too many arguments (limit: 255)")]
    TooManyArguments,

    #[error("malformed number literal '{0}'")]
    MalformedNumber(EcoString),
    #[error("malformed regex: {0}")]
    MalformedRegex(EcoString),

    #[error("'{0}' outside of a loop")]
    BreakOutsideLoop(&'static str),
    #[error("'return' outside of a function")]
    ReturnOutsideFunction,
    #[error("{0} is not supported")]
    Unimplemented(EcoString),
}

impl CompileErrorKind {
    /// Stable code for documentation lookup.
    pub fn code(&self) -> &'static str {
        match self {
            CompileErrorKind::DuplicateLocal(_) => "C001",
            CompileErrorKind::TooManyLocals => "C002",
            CompileErrorKind::TooManyConstants => "C003",
            CompileErrorKind::JumpTooFar => "C004",
            CompileErrorKind::UndeclaredVariable(_) => "C010",
            CompileErrorKind::UninitializedAccess(_) => "C011",
            CompileErrorKind::ReassignedVal(_) => "C012",
            CompileErrorKind::ReassignedConstant(_) => "C013",
            CompileErrorKind::InvalidAssignmentTarget(_) => "C020",
            CompileErrorKind::IllegalOperator { .. } => "C021",
            CompileErrorKind::CapacityWithConditional => "C022",
            CompileErrorKind::InvalidCapacity => "C023",
            CompileErrorKind::InvalidRecordKey => "C024",
            CompileErrorKind::IllegalPattern(_) => "C025",
            CompileErrorKind::DuplicateNamedArgument(_) => "C026",
            CompileErrorKind::TooManyArguments => "C027",
            CompileErrorKind::MalformedNumber(_) => "C030",
            CompileErrorKind::MalformedRegex(_) => "C031",
            CompileErrorKind::BreakOutsideLoop(_) => "C040",
            CompileErrorKind::ReturnOutsideFunction => "C041",
            CompileErrorKind::Unimplemented(_) => "C099",
        }
    }

    fn help(&self) -> Option<&'static str> {
        match self {
            CompileErrorKind::ReassignedVal(_) => Some("declare it with 'var' to allow reassignment"),
            CompileErrorKind::UndeclaredVariable(_) => {
                Some("declare it first with 'val', 'var' or ':='")
            }
            CompileErrorKind::UninitializedAccess(_) => Some("assign a value before reading it"),
            CompileErrorKind::CapacityWithConditional => Some("remove the ':capacity' suffix"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {}: {kind}", location.line)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub location: Loc,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, location: &Loc) -> Self {
        Self {
            kind,
            location: location.clone(),
        }
    }

    /// Convert to a Diagnostic for API boundary.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            message: self.kind.to_string(),
            span: self.location.span.clone(),
            line: self.location.line,
            help: self.kind.help().map(String::from),
            code: Some(String::from(self.kind.code())),
        }
    }
}
