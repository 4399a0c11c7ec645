#![allow(dead_code)]

use cinder::{Compilation, CompilationOptions, CompileErrorKind, Node, SymbolTable, compile};

/// Compile with a private symbol table so symbol ids start at 0.
pub fn compile_fresh(program: &Node<'_>) -> Compilation {
    let symbols = SymbolTable::new();
    compile(program, &CompilationOptions::default().with_symbols(&symbols))
}

pub fn listing(program: &Node<'_>) -> Vec<String> {
    let compilation = compile_fresh(program);
    assert!(
        compilation.is_ok(),
        "unexpected errors: {:?}",
        compilation.errors
    );
    compilation.function.listing().unwrap()
}

pub fn error_kinds(program: &Node<'_>) -> Vec<CompileErrorKind> {
    compile_fresh(program)
        .errors
        .into_iter()
        .map(|e| e.kind)
        .collect()
}
