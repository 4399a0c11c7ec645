//! Cinder - a bytecode compiler for a dynamic, expression-oriented language
//!
//! # Overview
//!
//! Cinder turns a syntax tree into a [`Function`]: instruction bytes for a
//! stack VM, a constant pool, line information and a frame size. Front ends
//! build trees with [`AstBuilder`]; the compiler folds what it can, checks
//! scoping rules, and reports every error it finds in one pass.
//!
//! # Quick Start
//!
//! ```
//! use bumpalo::Bump;
//! use cinder::{AstBuilder, CompilationOptions, compile};
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//! let program = b.program(&[
//!     b.var("total", Some(b.int("0"))),
//!     b.for_in("n", b.list(&[b.int("1"), b.int("2")]), &[b.assign(
//!         cinder::ast::AssignOp::Compound(cinder::ast::BinaryOp::Add),
//!         b.ident("total"),
//!         b.ident("n"),
//!     )]),
//!     b.ident("total"),
//! ]);
//!
//! let function = compile(program, &CompilationOptions::default())
//!     .into_result()
//!     .unwrap();
//! assert!(function.listing().unwrap().iter().any(|line| line.starts_with("ForIn")));
//! ```
//!
//! # Diagnostics
//!
//! Failed compilations carry one [`Diagnostic`] per error. [`render_error`]
//! and friends print them against the program's source text:
//!
//! ```
//! use bumpalo::Bump;
//! use cinder::{AstBuilder, CompilationOptions, compile, render_error_to_string_no_color};
//!
//! let arena = Bump::new();
//! let b = AstBuilder::new(&arena);
//! let program = b.program(&[b.ident("missing")]);
//!
//! let error = compile(program, &CompilationOptions::default())
//!     .into_result()
//!     .unwrap_err();
//! let output = render_error_to_string_no_color(&error, "<main>", "missing");
//! assert!(output.contains("undeclared variable 'missing'"));
//! ```

pub mod error_renderer;

// Re-export public API from cinder_core
pub use cinder_core::api::{
    Compilation, CompilationOptions, Diagnostic, Error, Severity, compile,
};

// Re-export commonly used types
pub use cinder_core::ast::{self, AstBuilder, Node};
pub use cinder_core::compiler::{self, CompileError, CompileErrorKind};
pub use cinder_core::values::{self, Symbol, SymbolTable, Value};
pub use cinder_core::vm::{self, Function, Opcode};

pub use error_renderer::{
    render_error, render_error_to, render_error_to_string, render_error_to_string_no_color,
};
