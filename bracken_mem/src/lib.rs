// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bracken Mem: memory accounting for the Bracken eventing stack.
//!
//! This crate provides the two memory-facing collaborators the dispatcher in
//! `bracken_eventing` is built against:
//!
//! - **Memory hooks** ([`MemoryHooks`], [`set_memory_hooks`]): an installable
//!   observer-and-veto point consulted before each discrete heap allocation
//!   the eventing stack performs, and notified when that storage is released.
//!   Hooks exist for exercising out-of-memory paths and for accounting
//!   experiments; with no hooks installed every request succeeds.
//! - **Pools** ([`Pool`]): small scope-bound arenas with `alloc`/`strdup`
//!   operations that signal exhaustion through [`OutOfMemory`]. The dispatcher
//!   embeds one pool per event triggering and releases it with the triggering.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use bracken_mem::{MemoryHooks, Pool, Region, set_memory_hooks};
//!
//! #[derive(Default)]
//! struct Counting {
//!     allocs: Cell<usize>,
//!     frees: Cell<usize>,
//! }
//!
//! impl MemoryHooks for Counting {
//!     fn alloc(&self, _region: Region, _bytes: usize) -> bool {
//!         self.allocs.set(self.allocs.get() + 1);
//!         true
//!     }
//!     fn free(&self, _region: Region, _bytes: usize) {
//!         self.frees.set(self.frees.get() + 1);
//!     }
//! }
//!
//! let counting = Rc::new(Counting::default());
//! set_memory_hooks(Some(counting.clone()));
//!
//! {
//!     let pool = Pool::new();
//!     let greeting = pool.strdup("hello").unwrap();
//!     assert_eq!(&*greeting, "hello");
//! } // pool dropped: storage released
//!
//! set_memory_hooks(None);
//! assert_eq!(counting.allocs.get(), counting.frees.get());
//! ```
//!
//! ## Threading
//!
//! The Bracken stack is strictly single-threaded; hook installation is
//! likewise scoped to the calling thread. Installing or removing hooks while
//! a dispatcher on the same thread is mid-trigger is a contract violation
//! (the original accounting for in-flight storage would be torn).

mod hooks;
mod pool;

pub use hooks::{
    MemoryHooks, OutOfMemory, Region, report_free, request_alloc, request_grow, set_memory_hooks,
};
pub use pool::Pool;
