//! Bytecode compiler for Cinder programs.
//!
//! This module turns a syntax tree into a [`Function`] holding the program's
//! bytecode, its constant pool and line information. Nested function and
//! method definitions become `Function` constants of their parent.
//!
//! ## Design
//!
//! - Single pass over the tree; jumps are emitted as placeholders and
//!   patched once their target is known
//! - Scopes map names to frame slots (see [`crate::scope_stack`])
//! - Constant sub-expressions are folded before emission (see [`fold`])
//! - Errors are recorded where they occur and a placeholder keeps the
//!   stack balanced, so one run reports as many problems as possible

mod assignment;
mod bytecode;
mod calls;
mod collections;
mod control_flow;
mod emitter;
mod error;
pub mod fold;
mod pattern;

#[cfg(test)]
mod bytecode_test;

pub use bytecode::{BytecodeCompiler, Compilation};
pub use emitter::{Emitter, JumpLabel};
pub use error::{CompileError, CompileErrorKind};
