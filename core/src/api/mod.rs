//! Public API for the Cinder compiler.
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use cinder_core::api::{CompilationOptions, compile};
//! use cinder_core::ast::AstBuilder;
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//! let program = b.program(&[b.val("x", b.int("1")), b.add(b.ident("x"), b.int("2"))]);
//!
//! let function = compile(program, &CompilationOptions::default())
//!     .into_result()
//!     .unwrap();
//! assert_eq!(function.frame_size, 2);
//! ```

pub mod error;
pub mod options;

pub use crate::compiler::Compilation;
pub use error::{Diagnostic, Error, Severity};
pub use options::CompilationOptions;

use crate::ast::Node;
use crate::compiler::BytecodeCompiler;

/// Compile a program into its main function.
///
/// Compilation never stops early: every error found is reported in the
/// returned [`Compilation`].
pub fn compile(program: &Node<'_>, options: &CompilationOptions<'_>) -> Compilation {
    BytecodeCompiler::compile_program(program, options)
}
