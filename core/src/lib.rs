//! Bytecode compiler for the Cinder language.
//!
//! The compiler consumes an arena-allocated syntax tree ([`ast`]) and
//! produces a [`vm::Function`]: instruction bytes, a constant pool, line
//! information and the frame size a VM needs to run it.

extern crate alloc;

pub mod api;
pub mod ast;
pub mod compiler;
pub mod scope_stack;
pub mod values;
pub mod vm;

pub use api::{CompilationOptions, compile};
