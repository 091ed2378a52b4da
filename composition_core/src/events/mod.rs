//! Event Registry - event declarations, handler bindings and the per-class
//! handler table they merge into.
//!
//! Events are identified by a closed enum per family (see [`EventKind`]), so a
//! handler can only ever name an event the family knows about. Whether the
//! event is declared anywhere in a particular hierarchy is still checked when
//! the class is composed.

mod random;

pub use random::*;

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::class::Instance;
use crate::error::{EngineError, EngineResult};
use crate::schema::{FieldType, FieldValue};

/// The closed set of events a family can declare.
pub trait EventKind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Stable name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Event fired on every freshly constructed instance, if the family has one.
    fn creation() -> Option<Self> {
        None
    }
}

/// How a dispatch decides whether handlers run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchMode {
    /// Every dispatch runs every handler.
    Always,
    /// Each dispatch draws once from the random source and runs the
    /// handlers only if the draw is below `rate`.
    Sampled { rate: f64 },
}

/// A declared event kind: its argument schema and dispatch mode.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDecl<E: EventKind> {
    pub kind: E,
    pub args: Vec<FieldType>,
    pub mode: DispatchMode,
    /// Trait level that declared the event.
    pub declared_by: String,
}

impl<E: EventKind> EventDecl<E> {
    /// Decide whether this dispatch fires, drawing at most once.
    pub fn should_fire(&self, source: &mut dyn RandomSource) -> bool {
        match self.mode {
            DispatchMode::Always => true,
            DispatchMode::Sampled { rate } => source.next_unit() < rate,
        }
    }

    /// Check arity and argument types against the declaration.
    pub fn check_args(&self, class: &str, args: &[FieldValue]) -> EngineResult<()> {
        let matches = self.args.len() == args.len()
            && self
                .args
                .iter()
                .zip(args)
                .all(|(ty, arg)| arg.field_type() == *ty);
        if matches {
            Ok(())
        } else {
            Err(EngineError::ArgumentMismatch {
                class: class.to_string(),
                event: self.kind.name().to_string(),
                expected: self.args.clone(),
                found: args.iter().map(FieldValue::field_type).collect(),
            })
        }
    }

    pub(crate) fn validate(&self, class: &str) -> EngineResult<()> {
        match self.mode {
            DispatchMode::Sampled { rate } if !(0.0..=1.0).contains(&rate) => {
                Err(EngineError::InvalidSamplingRate {
                    class: class.to_string(),
                    event: self.kind.name().to_string(),
                    rate,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Signature every handler has: the instance that fired plus the event arguments.
pub type HandlerFn<E> = dyn Fn(&mut Instance<E>, &[FieldValue]) + Send + Sync;

/// A handler function with a label for diagnostics.
///
/// Clones share identity, which is what the handler table deduplicates on:
/// binding the same `Handler` at two levels of a hierarchy runs it once.
pub struct Handler<E: EventKind> {
    label: Arc<str>,
    func: Arc<HandlerFn<E>>,
}

impl<E: EventKind> Handler<E> {
    pub fn new<F>(label: &str, func: F) -> Self
    where
        F: Fn(&mut Instance<E>, &[FieldValue]) + Send + Sync + 'static,
    {
        Self {
            label: Arc::from(label),
            func: Arc::new(func),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether both handles point at the same function object.
    pub fn same_as(&self, other: &Handler<E>) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }

    pub(crate) fn call(&self, instance: &mut Instance<E>, args: &[FieldValue]) {
        (self.func)(instance, args)
    }
}

impl<E: EventKind> Clone for Handler<E> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            func: self.func.clone(),
        }
    }
}

impl<E: EventKind> fmt::Debug for Handler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.label).finish()
    }
}

/// Per-class mapping from event to its ordered, duplicate-free handlers.
#[derive(Debug, Clone)]
pub struct HandlerTable<E: EventKind> {
    entries: HashMap<E, Vec<Handler<E>>>,
}

impl<E: EventKind> Default for HandlerTable<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<E: EventKind> HandlerTable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `kind` has an entry, even with no handlers.
    pub fn declare(&mut self, kind: E) {
        self.entries.entry(kind).or_default();
    }

    /// Union a base's handlers into this table, preserving order.
    pub fn merge_from(&mut self, base: &HandlerTable<E>) {
        for (kind, handlers) in &base.entries {
            let entry = self.entries.entry(*kind).or_default();
            for handler in handlers {
                push_unique(entry, handler);
            }
        }
    }

    /// Append a handler to a declared event.
    ///
    /// Returns `false` when the event has no entry in this table.
    pub fn bind(&mut self, kind: E, handler: &Handler<E>) -> bool {
        match self.entries.get_mut(&kind) {
            Some(entry) => {
                push_unique(entry, handler);
                true
            }
            None => false,
        }
    }

    /// Handlers for `kind`, in dispatch order.
    pub fn handlers(&self, kind: E) -> Option<&[Handler<E>]> {
        self.entries.get(&kind).map(Vec::as_slice)
    }

    pub fn contains(&self, kind: E) -> bool {
        self.entries.contains_key(&kind)
    }

    /// Total number of bound handlers across all events.
    pub fn handler_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

fn push_unique<E: EventKind>(entry: &mut Vec<Handler<E>>, handler: &Handler<E>) {
    if !entry.iter().any(|existing| existing.same_as(handler)) {
        entry.push(handler.clone());
    }
}
