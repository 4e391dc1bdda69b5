/*!
 * Shared Allocator Handle
 *
 * Strategies are single-threaded. A host that calls from several threads
 * goes through this handle, which serializes every call on one exclusive
 * lock per allocator instance.
 */

use super::traits::Allocator;
use super::types::{AllocResult, AllocatorStats, Pointer};
use crate::core::types::Size;
use parking_lot::Mutex;
use std::sync::Arc;

/// Clonable, lock-protected handle to one allocator instance
pub struct SharedAllocator<A> {
    inner: Arc<Mutex<A>>,
}

impl<A: Allocator> SharedAllocator<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            inner: Arc::new(Mutex::new(allocator)),
        }
    }

    pub fn allocate(&self, size: Size) -> AllocResult<Pointer> {
        self.inner.lock().allocate(size)
    }

    pub fn release(&self, ptr: Pointer, size: Size) {
        self.inner.lock().release(ptr, size)
    }

    pub fn pages_held(&self) -> usize {
        self.inner.lock().pages_held()
    }

    pub fn stats(&self) -> AllocatorStats {
        self.inner.lock().stats()
    }

    /// Run `f` with exclusive access to the allocator
    pub fn with<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<A> Clone for SharedAllocator<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
