// Copyright 2025 the Bracken Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scope-bound pools.
//!
//! A [`Pool`] is a small arena: values allocated from it stay alive until the
//! pool itself is destroyed. The eventing stack embeds one pool in each event
//! triggering so callbacks have somewhere to park per-triggering storage, and
//! releases it when the triggering completes.
//!
//! Allocation goes through the hook table ([`Region::Pool`]) so exhaustion
//! can be injected; construction itself never allocates, which is what lets
//! a pre-prepared trigger record carry a pool without a fallible step.

use core::cell::RefCell;
use core::fmt;
use std::any::Any;
use std::rc::Rc;

use crate::hooks::{OutOfMemory, Region, report_free, request_alloc};

/// A scope-bound arena with `alloc`/`strdup` operations.
///
/// Values are handed out behind `Rc`, and the pool retains one reference of
/// its own, so pool storage lives at least as long as the pool. Cloning a
/// handle out of an allocation extends that one object's life past the pool;
/// the pool's promise is ownership-until-destroyed, not exclusivity.
#[derive(Default)]
pub struct Pool {
    values: RefCell<Vec<(Rc<dyn Any>, usize)>>,
    strings: RefCell<Vec<Rc<str>>>,
}

impl Pool {
    /// Creates an empty pool. Does not allocate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `value` in the pool.
    ///
    /// The value is retained until the pool is destroyed. Fails when the
    /// installed memory hooks refuse the request.
    pub fn alloc<T: 'static>(&self, value: T) -> Result<Rc<T>, OutOfMemory> {
        let bytes = size_of::<T>();
        request_alloc(Region::Pool, bytes)?;
        let handle = Rc::new(value);
        self.values.borrow_mut().push((handle.clone(), bytes));
        Ok(handle)
    }

    /// Copies `s` into the pool.
    ///
    /// The copy is retained until the pool is destroyed. Fails when the
    /// installed memory hooks refuse the request.
    pub fn strdup(&self, s: &str) -> Result<Rc<str>, OutOfMemory> {
        request_alloc(Region::Pool, s.len())?;
        let copy: Rc<str> = Rc::from(s);
        self.strings.borrow_mut().push(copy.clone());
        Ok(copy)
    }

    /// Returns the number of live allocations in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.borrow().len() + self.strings.borrow().len()
    }

    /// Returns `true` if nothing has been allocated from the pool.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("len", &self.len()).finish()
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        for (_value, bytes) in self.values.get_mut().drain(..) {
            report_free(Region::Pool, bytes);
        }
        for s in self.strings.get_mut().drain(..) {
            report_free(Region::Pool, s.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{MemoryHooks, set_memory_hooks};
    use core::cell::Cell;

    #[derive(Default)]
    struct Counting {
        allocs: Cell<usize>,
        frees: Cell<usize>,
    }

    impl MemoryHooks for Counting {
        fn alloc(&self, region: Region, _bytes: usize) -> bool {
            assert_eq!(region, Region::Pool);
            self.allocs.set(self.allocs.get() + 1);
            true
        }
        fn free(&self, region: Region, _bytes: usize) {
            assert_eq!(region, Region::Pool);
            self.frees.set(self.frees.get() + 1);
        }
    }

    struct Refuse;

    impl MemoryHooks for Refuse {
        fn alloc(&self, _region: Region, _bytes: usize) -> bool {
            false
        }
    }

    #[test]
    fn alloc_retains_value() {
        let pool = Pool::new();
        let value = pool.alloc(42_u32).unwrap();
        assert_eq!(*value, 42);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn strdup_copies() {
        let pool = Pool::new();
        let copy = pool.strdup("triggering").unwrap();
        assert_eq!(&*copy, "triggering");
        assert!(!pool.is_empty());
    }

    #[test]
    fn new_pool_is_empty() {
        assert!(Pool::new().is_empty());
    }

    #[test]
    fn drop_balances_the_books() {
        let counting = Rc::new(Counting::default());
        set_memory_hooks(Some(counting.clone()));
        {
            let pool = Pool::new();
            pool.alloc(1_u64).unwrap();
            pool.alloc("static").unwrap();
            pool.strdup("copied").unwrap();
        }
        set_memory_hooks(None);
        assert_eq!(counting.allocs.get(), 3);
        assert_eq!(counting.frees.get(), 3);
    }

    #[test]
    fn refused_alloc_reports_out_of_memory() {
        let pool = Pool::new();
        set_memory_hooks(Some(Rc::new(Refuse)));
        assert_eq!(pool.alloc(7_u8).unwrap_err(), OutOfMemory);
        assert_eq!(pool.strdup("x").unwrap_err(), OutOfMemory);
        set_memory_hooks(None);
        // Nothing was retained for the refused requests.
        assert!(pool.is_empty());
    }

    #[test]
    fn clone_outlives_pool() {
        let escaped = {
            let pool = Pool::new();
            pool.strdup("escapee").unwrap()
        };
        assert_eq!(&*escaped, "escapee");
    }
}
