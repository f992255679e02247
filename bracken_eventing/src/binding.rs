// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding records and the staged-mutation list discipline.
//!
//! Bindings attach callbacks to events. The list is insertion-ordered and
//! identity-keyed: a callback's function pointer is its key, so at most one
//! binding per function exists on an event, and binding the same function
//! again changes neither its position nor its argument.
//!
//! Mutation requested while the owning event is mid-dispatch is *staged* on
//! per-record flags rather than applied:
//!
//! - A bind appends a record with `pending_add` set. The active walk visits
//!   the record (indices stay stable under append) and skips it; cleanup
//!   promotes it, so it fires from the next dispatch onward.
//! - An unbind sets `pending_remove`. The record still runs in the active
//!   walk if the walk has not reached it yet; cleanup unlinks it. Removal
//!   takes effect between dispatches, never mid-walk.
//! - Binding a function whose record carries `pending_remove` clears the
//!   flag in place: same position, same argument, no duplicate.
//!
//! Outside dispatch there is nothing to stage; unbind unlinks immediately.

use core::cell::Cell;
use core::ptr;
use std::any::Any;
use std::rc::Rc;

use bracken_mem::OutOfMemory;

use crate::event::EventData;

/// Callback executed when an event is triggered.
///
/// `arg` is the value bound with the callback, if any. Bindings are unique
/// per function pointer: binding the same function twice is a no-op, which
/// also means one function cannot be registered with two different
/// arguments. Callbacks signal handling by setting
/// [`EventData::handled`](crate::EventData::handled) to `true`.
pub type NotifyFn = fn(&mut EventData, Option<&dyn Any>);

/// Callback executed when an event triggering completes.
///
/// `handled` is true if any notify callback marked the triggering handled;
/// `arg` is the value supplied when the event was triggered.
pub type ResultFn = fn(&mut EventData, bool, Option<&dyn Any>);

/// One callback bound to an event.
pub(crate) struct Binding {
    pub(crate) cb: NotifyFn,
    pub(crate) arg: Option<Rc<dyn Any>>,
    /// Set when the record was appended during a dispatch of its event; the
    /// active walk visits and skips it, cleanup promotes it.
    pub(crate) pending_add: Cell<bool>,
    /// Set when the record was unbound during a dispatch of its event; the
    /// active walk still runs it, cleanup unlinks it.
    pub(crate) pending_remove: Cell<bool>,
}

impl Binding {
    pub(crate) fn new(cb: NotifyFn, arg: Option<Rc<dyn Any>>, pending_add: bool) -> Self {
        Self {
            cb,
            arg,
            pending_add: Cell::new(pending_add),
            pending_remove: Cell::new(false),
        }
    }
}

/// Insertion-ordered list of bindings with staged mutation.
#[derive(Default)]
pub(crate) struct BindingList {
    entries: Vec<Binding>,
}

impl BindingList {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the record bound to `cb`, if any.
    pub(crate) fn position(&self, cb: NotifyFn) -> Option<usize> {
        self.entries.iter().position(|b| ptr::fn_addr_eq(b.cb, cb))
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Binding> {
        self.entries.get(index)
    }

    /// What the walk needs at `index`: the callback, its argument, and
    /// whether the record must be skipped because it was added during this
    /// dispatch. Cloned out so no borrow of the list survives into the
    /// callback.
    pub(crate) fn walk_entry(
        &self,
        index: usize,
    ) -> Option<(NotifyFn, Option<Rc<dyn Any>>, bool)> {
        self.entries
            .get(index)
            .map(|b| (b.cb, b.arg.clone(), b.pending_add.get()))
    }

    /// Appends `binding`, reserving space fallibly.
    pub(crate) fn try_push(&mut self, binding: Binding) -> Result<(), OutOfMemory> {
        self.entries.try_reserve(1).map_err(|_| OutOfMemory)?;
        self.entries.push(binding);
        Ok(())
    }

    /// Unlinks the record at `index` immediately.
    pub(crate) fn remove(&mut self, index: usize) -> Binding {
        self.entries.remove(index)
    }

    /// Applies staged mutations after a walk: unlinks every record marked
    /// `pending_remove` and promotes every record marked `pending_add`.
    /// Returns how many records were unlinked.
    pub(crate) fn cleanup(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|b| {
            if b.pending_remove.get() {
                false
            } else {
                b.pending_add.set(false);
                true
            }
        });
        before - self.entries.len()
    }

    /// Unlinks every record. Returns how many there were.
    pub(crate) fn clear_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    #[cfg(test)]
    pub(crate) fn callbacks(&self) -> Vec<NotifyFn> {
        self.entries.iter().map(|b| b.cb).collect()
    }
}
