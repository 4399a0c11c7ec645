//! Process-wide symbol interning.
//!
//! Method names, constant names and attribute names are encoded in the
//! bytecode as dense `u32` ids. The table is append-only so an id, once
//! handed out, stays valid for the life of the table.

use std::sync::{Mutex, MutexGuard};

use ecow::EcoString;
use hashbrown::HashMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Symbols travel by name: ids are only meaningful within one process, so
/// deserializing re-interns the name in the global table.
impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match SymbolTable::global().name(*self) {
            Some(name) => serializer.serialize_str(&name),
            None => Err(serde::ser::Error::custom(format_args!(
                "symbol {} is not in the global table",
                self.0
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = EcoString::deserialize(deserializer)?;
        Ok(SymbolTable::global().intern(&name))
    }
}

#[derive(Debug, Default)]
struct Interner {
    ids: HashMap<EcoString, Symbol>,
    names: Vec<EcoString>,
}

/// Append-only name → id interner, safe to share between threads.
#[derive(Debug, Default)]
pub struct SymbolTable {
    inner: Mutex<Interner>,
}

lazy_static! {
    static ref GLOBAL: SymbolTable = SymbolTable::new();
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table shared by every compilation that does not bring its own.
    pub fn global() -> &'static SymbolTable {
        &GLOBAL
    }

    fn lock(&self) -> MutexGuard<'_, Interner> {
        // The interner is never left half-updated, so a poisoned lock is
        // still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn intern(&self, name: &str) -> Symbol {
        let mut inner = self.lock();
        if let Some(symbol) = inner.ids.get(name) {
            return *symbol;
        }
        let symbol = Symbol(inner.names.len() as u32);
        let name = EcoString::from(name);
        inner.names.push(name.clone());
        inner.ids.insert(name, symbol);
        tracing::trace!(name = %inner.names[symbol.0 as usize], id = symbol.0, "Interned symbol");
        symbol
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.lock().ids.get(name).copied()
    }

    pub fn name(&self, symbol: Symbol) -> Option<EcoString> {
        self.lock().names.get(symbol.0 as usize).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
