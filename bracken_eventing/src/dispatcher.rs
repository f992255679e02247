// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The dispatcher: event table, moment queue, breadth-first dispatch loop,
//! and deferred destruction.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::any::Any;
use std::collections::VecDeque;
use std::rc::Rc;

use bracken_mem::{Pool, Region, report_free, request_alloc, request_grow};
use hashbrown::HashMap;

use crate::binding::{Binding, BindingList, ResultFn};
use crate::error::Error;
use crate::event::{Event, EventData, EventInner};
use crate::moment::{Moment, PreparedTrigger};
use crate::trace::TraceSink;

/// The per-source coordinator owning named events and the moment queue.
///
/// A `Dispatcher` is a cheap cloneable handle; clones refer to the same
/// dispatcher. Each dispatcher owns its events, its FIFO of pending
/// triggerings, and the flags that make reentrant use safe: triggering,
/// binding, unbinding, and even destruction may all be requested from inside
/// a callback without corrupting the dispatch in progress.
///
/// Dispatchers are strictly single-threaded (`!Send + !Sync`); all work runs
/// on the thread that called [`Event::trigger`].
///
/// # Panics
///
/// Every method panics if the dispatcher has already been destroyed; a
/// destroyed dispatcher must not be touched again.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Rc<DispatcherInner>,
}

pub(crate) struct DispatcherInner {
    pub(crate) source: Rc<dyn Any>,
    /// Case-folded name -> event. Original casing lives on the event.
    events: RefCell<HashMap<String, Event>>,
    queue: RefCell<VecDeque<Moment>>,
    /// True while a dispatch loop is draining the queue.
    running: Cell<bool>,
    /// Set when destroy was requested mid-dispatch; honored on loop exit.
    destroy_pending: Cell<bool>,
    pub(crate) destroyed: Cell<bool>,
    trace_sink: RefCell<Option<Rc<dyn TraceSink>>>,
}

impl Dispatcher {
    /// Creates a dispatcher for `source`.
    ///
    /// The source is an opaque identity: the dispatcher never inspects it,
    /// only hands it back through [`Dispatcher::source`], [`Event::source`],
    /// and [`EventData::source`]. Compare sources with [`Rc::ptr_eq`].
    ///
    /// # Errors
    ///
    /// [`Error::NoMemory`] if the installed memory hooks refuse the
    /// dispatcher record.
    pub fn new(source: Rc<dyn Any>) -> Result<Self, Error> {
        request_alloc(Region::Dispatcher, size_of::<DispatcherInner>())?;
        Ok(Self {
            inner: Rc::new(DispatcherInner {
                source,
                events: RefCell::new(HashMap::new()),
                queue: RefCell::new(VecDeque::new()),
                running: Cell::new(false),
                destroy_pending: Cell::new(false),
                destroyed: Cell::new(false),
                trace_sink: RefCell::new(None),
            }),
        })
    }

    /// The source identity this dispatcher was created for.
    #[must_use]
    pub fn source(&self) -> Rc<dyn Any> {
        self.live().source.clone()
    }

    /// Creates a named event under this dispatcher.
    ///
    /// Names are matched ASCII case-insensitively: creating `"Frame"` and
    /// looking up `"frame"` find the same event, and a second create with
    /// any casing of an existing name fails. The original casing is kept and
    /// returned by [`Event::name`]. Names are assumed to be ASCII letters
    /// and digits; no validation beyond non-emptiness is attempted.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `name` is empty.
    /// - [`Error::InvalidState`] if an event with this folded name exists.
    /// - [`Error::NoMemory`] if any allocation is refused; the dispatcher is
    ///   left unchanged.
    pub fn create_event(&self, name: &str) -> Result<Event, Error> {
        let inner = self.live();
        if name.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let folded = name.to_ascii_lowercase();
        if inner.events.borrow().contains_key(&folded) {
            return Err(Error::InvalidState);
        }

        request_alloc(Region::Event, size_of::<EventInner>())?;
        if request_alloc(Region::Name, name.len()).is_err() {
            report_free(Region::Event, size_of::<EventInner>());
            return Err(Error::NoMemory);
        }
        if let Err(error) = inner.reserve_event_slot() {
            report_free(Region::Name, name.len());
            report_free(Region::Event, size_of::<EventInner>());
            return Err(error);
        }

        let event = Event {
            inner: Rc::new(EventInner {
                name: name.to_owned(),
                dispatcher: Rc::downgrade(&inner),
                bindings: RefCell::new(BindingList::new()),
                dispatching: Cell::new(false),
            }),
        };
        inner.events.borrow_mut().insert(folded, event.clone());
        Ok(event)
    }

    /// Looks up an event by name, ASCII case-insensitively.
    #[must_use]
    pub fn get_event(&self, name: &str) -> Option<Event> {
        self.live()
            .events
            .borrow()
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    /// Allocates a trigger record up front.
    ///
    /// Pairs with [`Event::trigger_prepared`], which reuses the record and
    /// therefore cannot fail: the fallible step happens here, where the
    /// caller can still tolerate it. Release an unused record with
    /// [`PreparedTrigger::unprepare`].
    ///
    /// # Errors
    ///
    /// [`Error::NoMemory`] if the record is refused.
    pub fn prepare_trigger(&self) -> Result<PreparedTrigger, Error> {
        let inner = self.live();
        request_alloc(Region::Moment, size_of::<Moment>())?;
        if let Err(error) = inner.reserve_queue_slot() {
            report_free(Region::Moment, size_of::<Moment>());
            return Err(error);
        }
        Ok(PreparedTrigger::new(&inner))
    }

    /// Installs a trace sink observing this dispatcher's activity, or
    /// removes it with `None`. See [`crate::trace`].
    pub fn set_trace_sink(&self, sink: Option<Rc<dyn TraceSink>>) {
        *self.live().trace_sink.borrow_mut() = sink;
    }

    /// Destroys the dispatcher: unbinds every callback, frees every event
    /// and its name, the queue, and the dispatcher record itself.
    ///
    /// Called from inside a callback, destruction is deferred: the request
    /// is noted and honored when the outermost dispatch loop finishes
    /// draining the queue. Either way the dispatcher must not be touched
    /// after this call returns.
    pub fn destroy(&self) {
        let inner = self.live();
        if inner.running.get() {
            inner.destroy_pending.set(true);
            inner.trace(|t| t.destroy_deferred());
            return;
        }
        DispatcherInner::destroy_now(&inner);
    }

    fn live(&self) -> Rc<DispatcherInner> {
        assert!(
            !self.inner.destroyed.get(),
            "dispatcher used after destroy"
        );
        Rc::clone(&self.inner)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("events", &self.inner.events.borrow().len())
            .field("running", &self.inner.running.get())
            .field("destroyed", &self.inner.destroyed.get())
            .finish_non_exhaustive()
    }
}

impl DispatcherInner {
    /// Allocates and enqueues a moment. Nothing is enqueued on failure.
    pub(crate) fn enqueue(
        self: &Rc<Self>,
        event: Event,
        data: Option<Rc<dyn Any>>,
        result_cb: Option<ResultFn>,
        result_arg: Option<Rc<dyn Any>>,
    ) -> Result<(), Error> {
        request_alloc(Region::Moment, size_of::<Moment>())?;
        if let Err(error) = self.reserve_queue_slot() {
            report_free(Region::Moment, size_of::<Moment>());
            return Err(error);
        }
        self.push_moment(event, data, result_cb, result_arg);
        Ok(())
    }

    /// Enqueues a moment whose record was paid for at prepare time. No
    /// request on this path may fail.
    pub(crate) fn enqueue_prepared(
        self: &Rc<Self>,
        event: Event,
        data: Option<Rc<dyn Any>>,
        result_cb: Option<ResultFn>,
        result_arg: Option<Rc<dyn Any>>,
    ) {
        self.push_moment(event, data, result_cb, result_arg);
    }

    fn push_moment(
        &self,
        event: Event,
        data: Option<Rc<dyn Any>>,
        result_cb: Option<ResultFn>,
        result_arg: Option<Rc<dyn Any>>,
    ) {
        self.queue.borrow_mut().push_back(Moment {
            event: event.clone(),
            data,
            result_cb,
            result_arg,
        });
        self.trace(|t| t.moment_enqueued(event.name()));
    }

    /// Drains the queue unless a loop further up the stack already is.
    pub(crate) fn run(this: &Rc<Self>) {
        if this.running.get() {
            return;
        }
        this.running.set(true);
        loop {
            let moment = this.queue.borrow_mut().pop_front();
            let Some(moment) = moment else { break };
            Self::dispatch_moment(this, moment);
        }
        this.running.set(false);
        if this.destroy_pending.get() {
            Self::destroy_now(this);
        }
    }

    /// Walks one moment's binding list, applies staged mutations, reports
    /// the result, and frees the record.
    fn dispatch_moment(this: &Rc<Self>, moment: Moment) {
        let Moment {
            event,
            data,
            result_cb,
            result_arg,
        } = moment;

        this.trace(|t| t.moment_started(event.name()));
        event.inner.dispatching.set(true);

        let mut evt = EventData {
            dispatcher: Rc::clone(this),
            notifier: event.clone(),
            data,
            pool: Pool::new(),
            handled: false,
        };

        // Walk by index: staged removals leave the list untouched until
        // cleanup, and appends go to the tail, so indices are stable even
        // while callbacks mutate the list. No borrow is held across a
        // callback. Records marked for removal still run; records appended
        // during this walk are visited and skipped.
        let mut handled = false;
        let mut index = 0;
        loop {
            let entry = event.inner.bindings.borrow().walk_entry(index);
            let Some((cb, arg, added_this_dispatch)) = entry else {
                break;
            };
            index += 1;
            if added_this_dispatch {
                this.trace(|t| t.callback_skipped(event.name()));
                continue;
            }
            cb(&mut evt, arg.as_deref());
            // A callback can raise the flag, never lower it.
            handled = handled || evt.handled;
            evt.handled = handled;
            this.trace(|t| t.callback_invoked(event.name(), handled));
        }

        let removed = event.inner.bindings.borrow_mut().cleanup();
        for _ in 0..removed {
            report_free(Region::Binding, size_of::<Binding>());
            this.trace(|t| t.binding_removed(event.name()));
        }
        event.inner.dispatching.set(false);

        let handled = evt.handled;
        if let Some(result_cb) = result_cb {
            result_cb(&mut evt, handled, result_arg.as_deref());
        }

        drop(evt); // releases the per-moment pool
        this.trace(|t| t.moment_completed(event.name(), handled));
        report_free(Region::Moment, size_of::<Moment>());
    }

    fn destroy_now(this: &Rc<Self>) {
        debug_assert!(
            this.queue.borrow().is_empty(),
            "moment queue drains before destruction"
        );
        let events: Vec<Event> = this
            .events
            .borrow_mut()
            .drain()
            .map(|(_, event)| event)
            .collect();
        for event in events {
            let removed = event.inner.bindings.borrow_mut().clear_all();
            for _ in 0..removed {
                report_free(Region::Binding, size_of::<Binding>());
            }
            report_free(Region::Name, event.inner.name.len());
            report_free(Region::Event, size_of::<EventInner>());
        }
        this.destroy_pending.set(false);
        this.destroyed.set(true);
        this.trace(|t| t.destroyed());
        report_free(Region::Dispatcher, size_of::<DispatcherInner>());
    }

    fn reserve_event_slot(&self) -> Result<(), Error> {
        const ENTRY: usize = size_of::<(String, Event)>();
        let (len, capacity) = {
            let events = self.events.borrow();
            (events.len(), events.capacity())
        };
        if len == capacity {
            let grown = (capacity * 2).max(4);
            request_grow(Region::Table, capacity * ENTRY, grown * ENTRY)?;
        }
        self.events
            .borrow_mut()
            .try_reserve(1)
            .map_err(|_| Error::NoMemory)
    }

    fn reserve_queue_slot(&self) -> Result<(), Error> {
        const ENTRY: usize = size_of::<Moment>();
        let (len, capacity) = {
            let queue = self.queue.borrow();
            (queue.len(), queue.capacity())
        };
        if len == capacity {
            let grown = (capacity * 2).max(4);
            request_grow(Region::Table, capacity * ENTRY, grown * ENTRY)?;
        }
        self.queue
            .borrow_mut()
            .try_reserve(1)
            .map_err(|_| Error::NoMemory)
    }

    /// Runs `f` against the installed sink, if any, with the registry
    /// borrow already released so the sink may call back into the
    /// dispatcher.
    fn trace(&self, f: impl FnOnce(&dyn TraceSink)) {
        let sink = self.trace_sink.borrow().clone();
        if let Some(sink) = sink {
            f(&*sink);
        }
    }
}
