//! Configuration options for compilation.

use ecow::EcoString;

use crate::ast::Loc;
use crate::values::SymbolTable;
use crate::vm::SourceLocation;

/// Configuration options for compilation.
///
/// # Example
///
/// ```
/// use cinder_core::api::CompilationOptions;
/// use cinder_core::values::SymbolTable;
///
/// let symbols = SymbolTable::new();
/// let options = CompilationOptions::default()
///     .with_source_name("script.cin")
///     .with_symbols(&symbols)
///     .without_folding();
/// assert!(!options.fold_constants);
/// ```
#[derive(Debug, Clone)]
pub struct CompilationOptions<'s> {
    /// Recorded in every function's source location.
    pub source_name: EcoString,

    /// Evaluate constant sub-expressions at compile time and drop dead
    /// branches.
    ///
    /// Default: true
    pub fold_constants: bool,

    /// Interner for method, attribute and constant names.
    ///
    /// Default: `SymbolTable::global()`
    pub symbols: &'s SymbolTable,
}

impl Default for CompilationOptions<'static> {
    fn default() -> Self {
        Self {
            source_name: EcoString::from("<main>"),
            fold_constants: true,
            symbols: SymbolTable::global(),
        }
    }
}

impl<'s> CompilationOptions<'s> {
    pub fn with_source_name(self, source_name: impl Into<EcoString>) -> Self {
        Self {
            source_name: source_name.into(),
            ..self
        }
    }

    pub fn with_symbols<'t>(self, symbols: &'t SymbolTable) -> CompilationOptions<'t> {
        CompilationOptions {
            source_name: self.source_name,
            fold_constants: self.fold_constants,
            symbols,
        }
    }

    pub fn without_folding(self) -> Self {
        Self {
            fold_constants: false,
            ..self
        }
    }

    /// Where a function starting at `loc` lives.
    pub fn location(&self, loc: &Loc) -> SourceLocation {
        SourceLocation {
            source: self.source_name.clone(),
            line: loc.line,
            span: loc.span.0.clone(),
        }
    }
}
