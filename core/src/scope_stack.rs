//! Lexical scopes and local slot allocation.
//!
//! Every function owns one `ScopeStack`. Slots are handed out from a single
//! counter that only grows while scopes nest, so a scope always owns a
//! contiguous run of slots ending at `last_local_index`:
//! ```text
//! fn f(a) {          // slot 0: self, slot 1: a
//!   val b = 1        // slot 2
//!   if c {
//!     val d = 2      // slot 3   LEAVE_SCOPE 3 1
//!   }
//!   val e = 3        // slot 3 again
//! }
//! ```
//! Slot 0 holds the receiver (`self`) and is never handed out.

use hashbrown::HashMap;
use tracing::trace;

use crate::ast::Loc;
use crate::compiler::{CompileError, CompileErrorKind, Emitter};
use crate::vm::{Family, Width};

/// Highest slot index a local may occupy.
const MAX_LOCAL_INDEX: u32 = u16::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Local {
    pub slot: u32,
    /// Declared with `val`.
    pub single_assignment: bool,
    pub initialized: bool,
}

#[derive(Debug, Default)]
struct Scope<'a> {
    locals: HashMap<&'a str, Local>,
    /// Compiler temporaries; they occupy slots but have no name.
    anonymous: u32,
}

impl Scope<'_> {
    fn size(&self) -> u32 {
        self.locals.len() as u32 + self.anonymous
    }
}

#[derive(Debug)]
pub struct ScopeStack<'a> {
    scopes: Vec<Scope<'a>>,
    last_local_index: u32,
    max_local_index: u32,
}

impl<'a> Default for ScopeStack<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ScopeStack<'a> {
    /// A stack holding the function's root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            last_local_index: 0,
            max_local_index: 0,
        }
    }

    /// Number of open scopes, the root scope included.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn last_local_index(&self) -> u32 {
        self.last_local_index
    }

    pub fn max_local_index(&self) -> u32 {
        self.max_local_index
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
        trace!(depth = self.scopes.len(), "Entered scope");
    }

    /// Pop the innermost scope, releasing its slots at runtime.
    pub fn leave_scope(&mut self, emitter: &mut Emitter, loc: &Loc) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        debug_assert!(!self.scopes.is_empty(), "left the root scope");
        let n = scope.size();
        if n > 0 {
            emitter.emit_family(loc, Family::LeaveScope, &[self.last_local_index, n]);
            self.last_local_index -= n;
        }
        trace!(depth = self.scopes.len(), released = n, "Left scope");
    }

    /// Drop scopes above `depth` without emitting anything. Used to recover
    /// after an error aborted a statement halfway.
    pub fn truncate(&mut self, depth: usize) {
        while self.scopes.len() > depth.max(1) {
            if let Some(scope) = self.scopes.pop() {
                self.last_local_index -= scope.size();
            }
        }
    }

    /// Release, without popping, every scope from `depth` (0-based) inward.
    /// Used by `break`/`next` and by switch cases that jump past their own
    /// cleanup.
    pub fn emit_leave_from(&self, emitter: &mut Emitter, depth: usize, loc: &Loc) {
        let n: u32 = self.scopes[depth.min(self.scopes.len())..]
            .iter()
            .map(Scope::size)
            .sum();
        if n > 0 {
            emitter.emit_family(loc, Family::LeaveScope, &[self.last_local_index, n]);
        }
    }

    fn next_slot(&mut self, loc: &Loc) -> Result<u32, CompileError> {
        let slot = self.last_local_index + 1;
        if slot > MAX_LOCAL_INDEX {
            return Err(CompileError::new(CompileErrorKind::TooManyLocals, loc));
        }
        self.last_local_index = slot;
        self.max_local_index = self.max_local_index.max(slot);
        Ok(slot)
    }

    fn current(&mut self) -> &mut Scope<'a> {
        // The root scope is never popped.
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub fn define_local(
        &mut self,
        name: &'a str,
        single_assignment: bool,
        initialized: bool,
        loc: &Loc,
    ) -> Result<u32, CompileError> {
        if self.current().locals.contains_key(name) {
            return Err(CompileError::new(
                CompileErrorKind::DuplicateLocal(name.into()),
                loc,
            ));
        }
        let slot = self.next_slot(loc)?;
        self.current().locals.insert(
            name,
            Local {
                slot,
                single_assignment,
                initialized,
            },
        );
        trace!(name, slot, "Defined local");
        Ok(slot)
    }

    pub fn define_anonymous(&mut self, loc: &Loc) -> Result<u32, CompileError> {
        let slot = self.next_slot(loc)?;
        self.current().anonymous += 1;
        Ok(slot)
    }

    /// Innermost declaration of `name`, initialized or not.
    pub fn lookup(&self, name: &str) -> Option<Local> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.locals.get(name).copied())
    }

    /// A local that may be read.
    pub fn resolve_local(&self, name: &str, loc: &Loc) -> Result<Local, CompileError> {
        match self.lookup(name) {
            None => Err(CompileError::new(
                CompileErrorKind::UndeclaredVariable(name.into()),
                loc,
            )),
            Some(local) if !local.initialized => Err(CompileError::new(
                CompileErrorKind::UninitializedAccess(name.into()),
                loc,
            )),
            Some(local) => Ok(local),
        }
    }

    pub fn mark_initialized(&mut self, name: &str) {
        if let Some(local) = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.locals.get_mut(name))
        {
            local.initialized = true;
        }
    }

    /// Slots the frame needs, `self` included; 0 if no local was allocated.
    pub fn frame_size(&self) -> u32 {
        if self.max_local_index == 0 {
            0
        } else {
            self.max_local_index + 1
        }
    }

    /// Prepend the frame reservation once the body is complete.
    pub fn prep_locals(&self, emitter: &mut Emitter) {
        let size = self.frame_size();
        if size > 0 {
            emitter.prepend(Family::PrepLocals.opcode(Width::of(size)), &[size]);
        }
    }
}
