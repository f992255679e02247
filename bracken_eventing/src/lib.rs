// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bracken Eventing: a reentrant named-event dispatcher with breadth-first
//! triggering.
//!
//! ## Overview
//!
//! A caller owns a *source* (an opaque identity), creates a [`Dispatcher`]
//! bound to that source, declares named [`Event`]s under it, binds callbacks
//! to events, and triggers events with per-triggering payloads. The part that
//! earns this crate its keep is what callbacks are allowed to do *while they
//! run*: bind new callbacks, unbind callbacks (themselves and their peers),
//! trigger further events, and even destroy the dispatcher — all without
//! corrupting the dispatch in progress.
//!
//! Three rules make that safe:
//!
//! - **Staged binding mutation.** A bind or unbind that targets the event
//!   currently being dispatched is marked on the binding record, not applied.
//!   The active walk still runs records staged for removal (removal takes
//!   effect between dispatches, never mid-walk) and skips records added
//!   during the walk; both marks are resolved in a cleanup pass when the walk
//!   completes.
//! - **Breadth-first triggering.** An event triggered from inside a callback
//!   is appended to the dispatcher's moment queue. Every callback of the
//!   current event finishes (and its result callback runs) before the nested
//!   event is dispatched; nested triggerings drain in strict FIFO order.
//! - **Deferred destruction.** [`Dispatcher::destroy`] from inside a callback
//!   only notes the request; teardown happens when the outermost dispatch
//!   loop finishes draining the queue.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::any::Any;
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use bracken_eventing::{Dispatcher, EventData};
//!
//! fn on_ping(evt: &mut EventData, arg: Option<&dyn Any>) {
//!     let hits: &Cell<u32> = arg.and_then(|a| a.downcast_ref()).expect("bound arg");
//!     hits.set(hits.get() + 1);
//!     evt.handled = true;
//! }
//!
//! let dispatcher = Dispatcher::new(Rc::new("demo source")).unwrap();
//! let ping = dispatcher.create_event("ping").unwrap();
//!
//! let hits = Rc::new(Cell::new(0_u32));
//! ping.bind(on_ping, Some(hits.clone())).unwrap();
//! ping.trigger(None, None, None).unwrap();
//!
//! assert_eq!(hits.get(), 1);
//! dispatcher.destroy();
//! ```
//!
//! ## Callback identity
//!
//! Callbacks are plain function pointers, and the function pointer *is* the
//! binding's key: binding the same function again is a no-op that changes
//! neither the binding's position nor its argument, and one function cannot
//! be registered twice with different arguments. This is a deliberate part
//! of the contract, not an accident of implementation.
//!
//! ## Names
//!
//! Event names match ASCII case-insensitively. The casing used at creation
//! is preserved and returned by [`Event::name`]; lookups and duplicate
//! detection fold ASCII letters and leave other bytes alone.
//!
//! ## Handled aggregation
//!
//! Each triggering carries a sticky `handled` flag, seeded `false`. Any
//! callback may set [`EventData::handled`] to `true`; the dispatcher
//! re-asserts the flag after every callback, so it never drops back to
//! `false` within a triggering. The final value is passed to the result
//! callback supplied at trigger time.
//!
//! ## Memory accounting
//!
//! Every discrete allocation (dispatcher, event, name, binding, trigger
//! record, pool storage, table growth) is routed through the hooks in
//! [`bracken_mem`], so out-of-memory paths can be exercised and destruction
//! order observed. Fallible operations roll back cleanly when a request is
//! refused: a failed bind leaves the binding list untouched, a failed
//! trigger enqueues nothing. Callers that must trigger where failure is
//! intolerable pre-pay with [`Dispatcher::prepare_trigger`] and spend the
//! record with [`Event::trigger_prepared`].
//!
//! ## Threading
//!
//! The dispatcher is strictly single-threaded: handles are `!Send + !Sync`,
//! and every callback runs on the thread that called [`Event::trigger`].
//! The only suspension points are callback boundaries.

mod binding;
mod dispatcher;
mod error;
mod event;
mod moment;
pub mod trace;

pub use binding::{NotifyFn, ResultFn};
pub use dispatcher::Dispatcher;
pub use error::Error;
pub use event::{Event, EventData};
pub use moment::PreparedTrigger;
