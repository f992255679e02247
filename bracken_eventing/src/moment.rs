// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trigger records: the unit of the moment queue.

use core::cell::Cell;
use core::fmt;
use std::any::Any;
use std::rc::{Rc, Weak};

use bracken_mem::{Region, report_free};

use crate::binding::ResultFn;
use crate::dispatcher::DispatcherInner;
use crate::event::Event;

/// One pending triggering of one event with one payload.
pub(crate) struct Moment {
    pub(crate) event: Event,
    pub(crate) data: Option<Rc<dyn Any>>,
    pub(crate) result_cb: Option<ResultFn>,
    pub(crate) result_arg: Option<Rc<dyn Any>>,
}

/// A pre-paid trigger record.
///
/// Returned by
/// [`Dispatcher::prepare_trigger`](crate::Dispatcher::prepare_trigger) for
/// callers that must trigger where allocation failure is intolerable: the
/// record's allocation is requested (and can be refused) at prepare time, so
/// [`Event::trigger_prepared`] cannot fail later.
///
/// A record is single-use. Consume it with
/// [`Event::trigger_prepared`](crate::Event::trigger_prepared), or release an
/// unused record with [`unprepare`](Self::unprepare) (dropping it does the
/// same).
pub struct PreparedTrigger {
    dispatcher: Weak<DispatcherInner>,
    spent: Cell<bool>,
}

impl PreparedTrigger {
    pub(crate) fn new(dispatcher: &Rc<DispatcherInner>) -> Self {
        Self {
            dispatcher: Rc::downgrade(dispatcher),
            spent: Cell::new(false),
        }
    }

    /// Releases a record that will not be used, returning its storage.
    ///
    /// Equivalent to dropping the record; spelled out for call sites that
    /// want the release to be visible.
    pub fn unprepare(self) {}

    /// True if this record was prepared on `dispatcher`.
    pub(crate) fn is_for(&self, dispatcher: &Rc<DispatcherInner>) -> bool {
        self.dispatcher
            .upgrade()
            .is_some_and(|prepared_for| Rc::ptr_eq(&prepared_for, dispatcher))
    }

    /// Marks the record used; the queued moment now owns the storage and the
    /// dispatch loop reports its release.
    pub(crate) fn consume(&self) {
        self.spent.set(true);
    }
}

impl fmt::Debug for PreparedTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedTrigger")
            .field("spent", &self.spent.get())
            .finish()
    }
}

impl Drop for PreparedTrigger {
    fn drop(&mut self) {
        if !self.spent.get() {
            report_free(Region::Moment, size_of::<Moment>());
        }
    }
}
