// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Installable allocation hooks.
//!
//! The eventing stack performs a small, enumerable set of heap allocations:
//! dispatcher records, event records, name copies, binding records, trigger
//! records, pool storage, and the backing tables of its index and queue. Each
//! of these is routed through the hook table in this module, so an embedder
//! can refuse any one of them (to drive out-of-memory paths), count them
//! (to check for leaks), or watch when a particular region is released (to
//! observe destruction order).
//!
//! With no hooks installed, every request succeeds and releases go
//! unobserved. Installation is per-thread and must not happen while a
//! dispatcher on the same thread is mid-trigger.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

/// Classifies a hook-visible allocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Region {
    /// A dispatcher record.
    Dispatcher,
    /// An event record.
    Event,
    /// The owned copy of an event name.
    Name,
    /// A callback binding record.
    Binding,
    /// A trigger (moment) record.
    Moment,
    /// Storage handed out by a [`Pool`](crate::Pool).
    Pool,
    /// Backing storage of an index table or queue.
    Table,
}

/// Observer and veto point for the eventing stack's heap allocations.
///
/// All methods have defaults, so an implementation only overrides what it
/// cares about. Hook objects are shared behind `Rc` and therefore receive
/// `&self`; implementations that keep counters use interior mutability.
///
/// Returning `false` from [`alloc`](Self::alloc) or [`grow`](Self::grow)
/// refuses the request: the caller reports out-of-memory to its own caller
/// and rolls back any partial work, pairing every previously granted request
/// with a [`free`](Self::free) notification.
pub trait MemoryHooks {
    /// Called before `bytes` are allocated for `region`.
    ///
    /// Return `false` to refuse the allocation.
    fn alloc(&self, region: Region, bytes: usize) -> bool {
        let _ = (region, bytes);
        true
    }

    /// Called before backing storage for `region` grows from `old` to `new`
    /// bytes (the realloc-shaped paths: index and queue growth).
    ///
    /// Return `false` to refuse the growth.
    fn grow(&self, region: Region, old: usize, new: usize) -> bool {
        let _ = (region, old, new);
        true
    }

    /// Called when `bytes` previously granted for `region` are released.
    fn free(&self, region: Region, bytes: usize) {
        let _ = (region, bytes);
    }
}

/// Error returned when an allocation is refused by the installed hooks or
/// genuinely fails.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct OutOfMemory;

impl fmt::Display for OutOfMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("out of memory")
    }
}

impl core::error::Error for OutOfMemory {}

thread_local! {
    static HOOKS: RefCell<Option<Rc<dyn MemoryHooks>>> = const { RefCell::new(None) };
}

/// Installs `hooks` for the current thread, or restores the always-succeed
/// defaults when `None`.
///
/// Only defined while no dispatcher on this thread is mid-trigger: swapping
/// the observer under in-flight storage would leave its accounting torn.
pub fn set_memory_hooks(hooks: Option<Rc<dyn MemoryHooks>>) {
    HOOKS.with(|h| *h.borrow_mut() = hooks);
}

fn current() -> Option<Rc<dyn MemoryHooks>> {
    // Clone the handle out so hook methods run without the registry borrowed;
    // a hook is allowed to call back into this module.
    HOOKS.with(|h| h.borrow().clone())
}

/// Requests permission to allocate `bytes` for `region`.
///
/// Succeeds trivially when no hooks are installed.
pub fn request_alloc(region: Region, bytes: usize) -> Result<(), OutOfMemory> {
    match current() {
        Some(hooks) if !hooks.alloc(region, bytes) => Err(OutOfMemory),
        _ => Ok(()),
    }
}

/// Requests permission to grow backing storage for `region` from `old` to
/// `new` bytes.
pub fn request_grow(region: Region, old: usize, new: usize) -> Result<(), OutOfMemory> {
    match current() {
        Some(hooks) if !hooks.grow(region, old, new) => Err(OutOfMemory),
        _ => Ok(()),
    }
}

/// Reports that `bytes` previously granted for `region` were released.
pub fn report_free(region: Region, bytes: usize) {
    if let Some(hooks) = current() {
        hooks.free(region, bytes);
    }
}
