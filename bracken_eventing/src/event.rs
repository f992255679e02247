// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Events and the per-triggering data handed to callbacks.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::any::Any;
use std::rc::{Rc, Weak};

use bracken_mem::{Pool, Region, report_free, request_alloc};

use crate::binding::{Binding, BindingList, NotifyFn, ResultFn};
use crate::dispatcher::DispatcherInner;
use crate::error::Error;
use crate::moment::PreparedTrigger;

/// A named event under one dispatcher.
///
/// An `Event` is a cheap cloneable handle; clones refer to the same event.
/// Events are created through
/// [`Dispatcher::create_event`](crate::Dispatcher::create_event) and live
/// until their dispatcher is destroyed. Equality compares identity, not name.
///
/// All operations may be called from inside a callback of the same
/// dispatcher; mutations requested mid-dispatch are staged and applied when
/// the active walk completes (see the crate docs for the exact rules).
///
/// # Panics
///
/// Every method panics if the owning dispatcher has been destroyed; a
/// destroyed dispatcher and its events must not be touched again.
#[derive(Clone)]
pub struct Event {
    pub(crate) inner: Rc<EventInner>,
}

pub(crate) struct EventInner {
    pub(crate) name: String,
    pub(crate) dispatcher: Weak<DispatcherInner>,
    pub(crate) bindings: RefCell<BindingList>,
    /// True while the dispatch loop is walking this event's bindings.
    pub(crate) dispatching: Cell<bool>,
}

impl Event {
    /// The event's name, with the casing it was created with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The source identity of the owning dispatcher.
    ///
    /// Sources are opaque: compare them with [`Rc::ptr_eq`] or downcast them
    /// to the concrete type the embedder supplied.
    #[must_use]
    pub fn source(&self) -> Rc<dyn Any> {
        self.dispatcher().source.clone()
    }

    /// Binds `cb` to this event with an optional argument.
    ///
    /// Callbacks are unique by function pointer: if `cb` is already bound,
    /// this is a no-op that changes neither the binding's position nor its
    /// argument. If `cb` was unbound during the dispatch currently walking
    /// this event, the record is revived in place instead.
    ///
    /// A bind that occurs while this event is being dispatched takes effect
    /// on the *next* dispatch; the active walk does not invoke it.
    ///
    /// # Errors
    ///
    /// [`Error::NoMemory`] if the binding record cannot be allocated; the
    /// binding list is left unchanged.
    pub fn bind(&self, cb: NotifyFn, arg: Option<Rc<dyn Any>>) -> Result<(), Error> {
        let _dispatcher = self.dispatcher();

        let already_bound = {
            let bindings = self.inner.bindings.borrow();
            match bindings.position(cb) {
                Some(index) => {
                    let record = bindings.get(index).expect("position is in range");
                    // Rebinding a record staged for removal revives it in
                    // place; everything else about it is left alone.
                    record.pending_remove.set(false);
                    true
                }
                None => false,
            }
        };
        if already_bound {
            return Ok(());
        }

        request_alloc(Region::Binding, size_of::<Binding>())?;
        let binding = Binding::new(cb, arg, self.inner.dispatching.get());
        match self.inner.bindings.borrow_mut().try_push(binding) {
            Ok(()) => Ok(()),
            Err(oom) => {
                report_free(Region::Binding, size_of::<Binding>());
                Err(oom.into())
            }
        }
    }

    /// Unbinds `cb` from this event.
    ///
    /// If `cb` is not bound, this does nothing. If this event is currently
    /// being dispatched, the record is staged for removal: it still runs in
    /// the active walk if the walk has not reached it yet, and it is
    /// unlinked when the walk completes. Otherwise it is unlinked
    /// immediately.
    pub fn unbind(&self, cb: NotifyFn) {
        let _dispatcher = self.dispatcher();

        let removed = {
            let mut bindings = self.inner.bindings.borrow_mut();
            match bindings.position(cb) {
                None => None,
                Some(index) if self.inner.dispatching.get() => {
                    bindings
                        .get(index)
                        .expect("position is in range")
                        .pending_remove
                        .set(true);
                    None
                }
                Some(index) => Some(bindings.remove(index)),
            }
        };
        if removed.is_some() {
            report_free(Region::Binding, size_of::<Binding>());
        }
    }

    /// Triggers this event with per-triggering `data`.
    ///
    /// Bound callbacks run in insertion order, each receiving the shared
    /// [`EventData`] and its own bound argument. When all of them have run
    /// (and staged mutations have been applied), `result_cb` receives the
    /// aggregated handled flag and `result_arg`.
    ///
    /// Triggering is breadth-first: an event triggered from inside a
    /// callback is queued and dispatched after every callback of the current
    /// walk has finished. If this dispatcher is already mid-dispatch, the
    /// call only enqueues and returns; the outer dispatch drains it.
    ///
    /// # Errors
    ///
    /// [`Error::NoMemory`] if the trigger record cannot be allocated;
    /// nothing is enqueued.
    pub fn trigger(
        &self,
        data: Option<Rc<dyn Any>>,
        result_cb: Option<ResultFn>,
        result_arg: Option<Rc<dyn Any>>,
    ) -> Result<(), Error> {
        let dispatcher = self.dispatcher();
        dispatcher.enqueue(self.clone(), data, result_cb, result_arg)?;
        DispatcherInner::run(&dispatcher);
        Ok(())
    }

    /// Triggers this event reusing a record from
    /// [`Dispatcher::prepare_trigger`](crate::Dispatcher::prepare_trigger).
    ///
    /// Semantics match [`trigger`](Self::trigger), but the record was paid
    /// for up front, so this path performs no fallible allocation and cannot
    /// report out-of-memory. The record is single-use and is consumed here.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `prepared` was prepared on a different
    /// dispatcher.
    pub fn trigger_prepared(
        &self,
        data: Option<Rc<dyn Any>>,
        result_cb: Option<ResultFn>,
        result_arg: Option<Rc<dyn Any>>,
        prepared: PreparedTrigger,
    ) {
        let dispatcher = self.dispatcher();
        debug_assert!(
            prepared.is_for(&dispatcher),
            "prepared trigger used with a different dispatcher"
        );
        prepared.consume();
        dispatcher.enqueue_prepared(self.clone(), data, result_cb, result_arg);
        DispatcherInner::run(&dispatcher);
    }

    /// Number of bindings currently attached, including records staged for
    /// add or removal during an active dispatch.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    /// Upgrades the back-reference, panicking if the dispatcher is gone.
    pub(crate) fn dispatcher(&self) -> Rc<DispatcherInner> {
        let dispatcher = self
            .inner
            .dispatcher
            .upgrade()
            .expect("event used after its dispatcher was destroyed");
        assert!(
            !dispatcher.destroyed.get(),
            "event used after its dispatcher was destroyed"
        );
        dispatcher
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Event {}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.inner.name)
            .field("bindings", &self.inner.bindings.borrow().len())
            .finish()
    }
}

/// Per-triggering data shared by every callback of one moment.
///
/// One `EventData` is built when a moment starts and is passed by mutable
/// borrow to each eligible callback, then to the result callback. Callbacks
/// must not retain references past their return — the borrow makes that
/// structurally impossible.
pub struct EventData {
    pub(crate) dispatcher: Rc<DispatcherInner>,
    pub(crate) notifier: Event,
    pub(crate) data: Option<Rc<dyn Any>>,
    pub(crate) pool: Pool,
    /// Sticky handled flag for this triggering.
    ///
    /// Seeded `false`; any callback may set it to `true`. The dispatcher
    /// re-asserts the flag after every callback, so once it is `true` no
    /// later callback can lower it. The final value is reported to the
    /// result callback.
    pub handled: bool,
}

impl EventData {
    /// The source identity of the dispatcher that owns this triggering.
    #[must_use]
    pub fn source(&self) -> &dyn Any {
        &*self.dispatcher.source
    }

    /// The name of the event being dispatched.
    #[must_use]
    pub fn name(&self) -> &str {
        self.notifier.name()
    }

    /// The event being dispatched. Reentrant calls (bind, unbind, trigger)
    /// go through this handle.
    #[must_use]
    pub fn notifier(&self) -> &Event {
        &self.notifier
    }

    /// The payload supplied to this triggering, if any.
    #[must_use]
    pub fn data(&self) -> Option<&dyn Any> {
        self.data.as_deref()
    }

    /// The pool scoped to this triggering. Storage allocated from it is
    /// released when the moment completes.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl fmt::Debug for EventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventData")
            .field("name", &self.name())
            .field("handled", &self.handled)
            .finish_non_exhaustive()
    }
}
