//! Collection literals.
//!
//! A literal whose elements are all static becomes one pooled constant.
//! Otherwise the collection is built at runtime, with static runs of two or
//! more elements at either end pooled and appended with `EXTEND`:
//! ```text
//! [1, 2, x, 3, 4]
//!     NEW_LIST 5
//!     LOAD_VALUE [1, 2]
//!     EXTEND
//!     GET_LOCAL x
//!     APPEND
//!     LOAD_VALUE [3, 4]
//!     EXTEND
//! ```

use ecow::EcoString;

use super::bytecode::BytecodeCompiler;
use super::error::{CompileError, CompileErrorKind};
use super::fold;
use crate::ast::{ContainerKind, Element, Loc, Node, NodeKind};
use crate::values::Value;
use crate::vm::{Family, Opcode};

/// Shortest static run worth pooling.
const MIN_STATIC_RUN: usize = 2;

/// A compile-time element of a collection literal.
pub(super) enum StaticElement {
    Item(Value),
    Entry(Value, Value),
    Field(EcoString, Value),
}

fn new_family(kind: ContainerKind) -> Family {
    match kind {
        ContainerKind::List => Family::NewList,
        ContainerKind::Tuple => Family::NewTuple,
        ContainerKind::Set => Family::NewSet,
        ContainerKind::Map => Family::NewMap,
        ContainerKind::Record => Family::NewRecord,
    }
}

/// Build the constant for a fully static literal. Set elements keep their
/// first occurrence only.
pub(super) fn collect(kind: ContainerKind, elements: Vec<StaticElement>) -> Value {
    let mut items = Vec::new();
    let mut entries = Vec::new();
    let mut fields = Vec::new();
    for element in elements {
        match element {
            StaticElement::Item(v) => items.push(v),
            StaticElement::Entry(k, v) => entries.push((k, v)),
            StaticElement::Field(k, v) => fields.push((k, v)),
        }
    }
    match kind {
        ContainerKind::List => Value::List(items),
        ContainerKind::Tuple => Value::Tuple(items),
        ContainerKind::Set => Value::Set(distinct(items)),
        ContainerKind::Map => Value::Map(entries),
        ContainerKind::Record => Value::Record(fields),
    }
}

/// `values` without repeats, in first-seen order.
pub(super) fn distinct(values: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

impl<'a, 'c> BytecodeCompiler<'a, 'c> {
    /// Build a literal at runtime. Fully static literals never get here:
    /// the folder turns them into one constant.
    pub(super) fn compile_collection(
        &mut self,
        kind: ContainerKind,
        elements: &'a [Element<'a>],
        capacity: Option<&'a Node<'a>>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        let generated = elements.iter().any(Element::is_generated);
        let capacity = match capacity {
            Some(_) if generated => {
                return Err(self.error(CompileErrorKind::CapacityWithConditional, loc));
            }
            Some(node) => Some(self.capacity(node)?),
            None => None,
        };

        let statics = elements
            .iter()
            .map(|element| self.static_element(kind, element))
            .collect::<Result<Vec<_>, _>>()?;

        let size = capacity.unwrap_or(elements.iter().filter(|e| !e.is_generated()).count() as u32);
        self.emitter.emit_family(loc, new_family(kind), &[size]);

        let prefix = statics.iter().take_while(|s| s.is_some()).count();
        let prefix = if prefix >= MIN_STATIC_RUN { prefix } else { 0 };
        let suffix = statics[prefix..].iter().rev().take_while(|s| s.is_some()).count();
        let suffix = if suffix >= MIN_STATIC_RUN { suffix } else { 0 };
        let middle = prefix..elements.len() - suffix;

        let mut statics = statics;
        let tail: Vec<StaticElement> = statics.drain(middle.end..).flatten().collect();
        let head: Vec<StaticElement> = statics.drain(..prefix).flatten().collect();

        self.extend_static(kind, head, loc)?;
        for element in &elements[middle] {
            self.compile_element(kind, element, loc)?;
        }
        self.extend_static(kind, tail, loc)
    }

    fn extend_static(
        &mut self,
        kind: ContainerKind,
        run: Vec<StaticElement>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        if run.is_empty() {
            return Ok(());
        }
        // EXTEND copies the elements out, so the pooled run is never shared.
        self.emitter.emit_constant(loc, collect(kind, run))?;
        self.emitter.emit_op(loc, Opcode::Extend);
        Ok(())
    }

    /// `:N` capacity suffix: a non-negative integer constant.
    fn capacity(&self, node: &Node<'_>) -> Result<u32, CompileError> {
        let value = match &node.kind {
            NodeKind::Int {
                digits,
                radix,
                width,
            } => fold::parse_int(digits, *radix, *width),
            _ => self.fold(node),
        };
        match value {
            Some(Value::Int(int)) => int
                .as_i64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| self.error(CompileErrorKind::InvalidCapacity, &node.loc)),
            _ => Err(self.error(CompileErrorKind::InvalidCapacity, &node.loc)),
        }
    }

    /// Record keys are symbols (or strings, taken as symbol names).
    fn record_key(&self, key: &Node<'_>) -> Result<EcoString, CompileError> {
        let value = match &key.kind {
            NodeKind::Symbol(s) | NodeKind::Str(s) => return Ok((*s).into()),
            _ => self.fold(key),
        };
        match value {
            Some(Value::Symbol(s) | Value::Str(s)) => Ok(s),
            _ => Err(self.error(CompileErrorKind::InvalidRecordKey, &key.loc)),
        }
    }

    /// The compile-time form of an element, if it has one. Elements that do
    /// not belong in this kind of collection are errors.
    fn static_element(
        &self,
        kind: ContainerKind,
        element: &Element<'_>,
    ) -> Result<Option<StaticElement>, CompileError> {
        let element = match (kind, element) {
            (ContainerKind::Map | ContainerKind::Record, Element::Item(node)) => {
                return Err(self.error(CompileErrorKind::InvalidRecordKey, &node.loc));
            }
            (_, Element::Item(node)) => self.fold(node).map(StaticElement::Item),
            (ContainerKind::Map, Element::Keyed { key, value }) => self
                .fold(key)
                .zip(self.fold(value))
                .map(|(k, v)| StaticElement::Entry(k, v)),
            (ContainerKind::Record, Element::Keyed { key, value }) => {
                let key = self.record_key(key)?;
                self.fold(value).map(|v| StaticElement::Field(key, v))
            }
            (_, Element::Keyed { key, .. }) => {
                return Err(self.error(
                    CompileErrorKind::Unimplemented(
                        ecow::eco_format!("keyed element in a {}", kind_name(kind)),
                    ),
                    &key.loc,
                ));
            }
            (_, Element::If { .. } | Element::For { .. }) => None,
        };
        Ok(element)
    }

    /// Add one element to the collection on top of the stack.
    fn compile_element(
        &mut self,
        kind: ContainerKind,
        element: &'a Element<'a>,
        loc: &Loc,
    ) -> Result<(), CompileError> {
        match element {
            Element::Item(node) => {
                self.compile_expr(node)?;
                self.emitter.emit_op(loc, Opcode::Append);
            }
            Element::Keyed { key, value } if kind == ContainerKind::Record => {
                let key = self.record_key(key)?;
                self.emit_value(loc, Value::Symbol(key))?;
                self.compile_expr(value)?;
                self.emitter.emit_op(loc, Opcode::AppendAt);
            }
            Element::Keyed { key, value } => {
                self.compile_expr(key)?;
                self.compile_expr(value)?;
                self.emitter.emit_op(loc, Opcode::MapSet);
            }
            Element::If {
                cond,
                negate,
                element,
            } => {
                if let Some(value) = self.fold(cond) {
                    if value.is_truthy() != *negate {
                        self.compile_element(kind, element, loc)?;
                    }
                    return Ok(());
                }
                self.compile_expr(cond)?;
                let skip = if *negate { Opcode::JumpIf } else { Opcode::JumpUnless };
                let skip = self.emitter.emit_jump(loc, skip);
                self.emitter.emit_op(loc, Opcode::Pop);
                self.compile_element(kind, element, loc)?;
                let end = self.emitter.emit_jump(loc, Opcode::Jump);
                self.emitter.patch_jump(skip, loc)?;
                self.emitter.emit_op(loc, Opcode::Pop);
                self.emitter.patch_jump(end, loc)?;
            }
            Element::For { var, iter, element } => {
                self.scopes.enter_scope();
                let (iterator, slot) = self.begin_iteration(var, iter, loc)?;
                let start = self.emitter.offset();
                self.emit_get_local(loc, iterator);
                let done = self.emitter.emit_jump(loc, Opcode::ForIn);
                self.emit_set_local(loc, slot);
                self.emitter.emit_op(loc, Opcode::Pop);
                self.compile_element(kind, element, loc)?;
                self.emitter.emit_loop(loc, start)?;
                self.emitter.patch_jump(done, loc)?;
                self.scopes.leave_scope(&mut self.emitter, loc);
            }
        }
        Ok(())
    }
}

fn kind_name(kind: ContainerKind) -> &'static str {
    match kind {
        ContainerKind::List => "list",
        ContainerKind::Tuple => "tuple",
        ContainerKind::Set => "set",
        ContainerKind::Map => "map",
        ContainerKind::Record => "record",
    }
}
