//! Compile-time values, sized numbers and symbols.

mod number;
mod symbol;
mod value;

pub use number::{FloatValue, IntValue, big_binary, unbounded_binary};
pub use symbol::{Symbol, SymbolTable};
pub use value::Value;
