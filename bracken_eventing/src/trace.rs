// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observability helpers for dispatch.
//!
//! The dispatcher intentionally stores no history of its own: once a moment
//! completes, nothing records which callbacks ran or in what order. For many
//! embedders it is useful to answer questions like "why did this triggering
//! report handled?" or "which binding disappeared at cleanup?".
//!
//! This module provides a minimal, additive hook for that: a [`TraceSink`]
//! installed per dispatcher via
//! [`Dispatcher::set_trace_sink`](crate::Dispatcher::set_trace_sink), plus a
//! small recorder, [`TraceRecorder`], which stores the observed transitions
//! in order. Every sink method has a no-op default, so an implementation
//! overrides only what it watches.

use core::cell::RefCell;

/// A callback sink observing dispatcher activity.
///
/// Sinks are shared behind `Rc` and receive `&self`; implementations that
/// accumulate state use interior mutability. A sink must not assume it sees
/// a whole dispatch: it can be installed or replaced between moments.
pub trait TraceSink {
    /// Called when a moment for `event` is appended to the queue.
    fn moment_enqueued(&self, event: &str) {
        let _ = event;
    }

    /// Called when the dispatch loop starts walking `event`'s bindings.
    fn moment_started(&self, event: &str) {
        let _ = event;
    }

    /// Called after an eligible callback for `event` returns; `handled` is
    /// the sticky flag's value at that point.
    fn callback_invoked(&self, event: &str, handled: bool) {
        let _ = (event, handled);
    }

    /// Called when the walk reaches a binding created during this same
    /// dispatch and skips it.
    fn callback_skipped(&self, event: &str) {
        let _ = event;
    }

    /// Called when the cleanup pass unlinks a binding marked for removal.
    fn binding_removed(&self, event: &str) {
        let _ = event;
    }

    /// Called after cleanup and the result callback, when the moment's
    /// storage is released. `handled` is the aggregated flag.
    fn moment_completed(&self, event: &str, handled: bool) {
        let _ = (event, handled);
    }

    /// Called when a destroy request arrives mid-dispatch and is deferred.
    fn destroy_deferred(&self) {}

    /// Called when the dispatcher's storage is torn down.
    fn destroyed(&self) {}
}

/// One observed transition, as recorded by [`TraceRecorder`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TraceEntry {
    /// A moment was enqueued for the named event.
    Enqueued(String),
    /// The walk of the named event's bindings began.
    Started(String),
    /// A callback for the named event returned, with the sticky flag value.
    Invoked(String, bool),
    /// A binding added during this dispatch was visited and skipped.
    Skipped(String),
    /// Cleanup unlinked a binding of the named event.
    BindingRemoved(String),
    /// The moment for the named event completed, with the aggregated flag.
    Completed(String, bool),
    /// A destroy request was deferred.
    DestroyDeferred,
    /// The dispatcher was torn down.
    Destroyed,
}

/// Records observed transitions in order.
///
/// Useful in tests and when debugging callback ordering. When a transition
/// has no matching expectation, [`TraceRecorder::take`] drains the log so a
/// fresh phase starts clean.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    entries: RefCell<Vec<TraceEntry>>,
}

impl TraceRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded transitions, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.borrow().clone()
    }

    /// Drains and returns the recorded transitions, oldest first.
    pub fn take(&self) -> Vec<TraceEntry> {
        core::mem::take(&mut *self.entries.borrow_mut())
    }

    fn push(&self, entry: TraceEntry) {
        self.entries.borrow_mut().push(entry);
    }
}

impl TraceSink for TraceRecorder {
    fn moment_enqueued(&self, event: &str) {
        self.push(TraceEntry::Enqueued(event.to_owned()));
    }

    fn moment_started(&self, event: &str) {
        self.push(TraceEntry::Started(event.to_owned()));
    }

    fn callback_invoked(&self, event: &str, handled: bool) {
        self.push(TraceEntry::Invoked(event.to_owned(), handled));
    }

    fn callback_skipped(&self, event: &str) {
        self.push(TraceEntry::Skipped(event.to_owned()));
    }

    fn binding_removed(&self, event: &str) {
        self.push(TraceEntry::BindingRemoved(event.to_owned()));
    }

    fn moment_completed(&self, event: &str, handled: bool) {
        self.push(TraceEntry::Completed(event.to_owned(), handled));
    }

    fn destroy_deferred(&self) {
        self.push(TraceEntry::DestroyDeferred);
    }

    fn destroyed(&self) {
        self.push(TraceEntry::Destroyed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_preserves_order() {
        let recorder = TraceRecorder::new();
        recorder.moment_enqueued("a");
        recorder.moment_started("a");
        recorder.callback_invoked("a", true);
        recorder.moment_completed("a", true);

        assert_eq!(
            recorder.entries(),
            vec![
                TraceEntry::Enqueued("a".to_owned()),
                TraceEntry::Started("a".to_owned()),
                TraceEntry::Invoked("a".to_owned(), true),
                TraceEntry::Completed("a".to_owned(), true),
            ]
        );
    }

    #[test]
    fn take_drains() {
        let recorder = TraceRecorder::new();
        recorder.destroy_deferred();
        assert_eq!(recorder.take(), vec![TraceEntry::DestroyDeferred]);
        assert!(recorder.entries().is_empty());
    }
}
