/*!
 * Memory Traits
 * Allocator and page provider abstractions
 */

use super::page::Page;
use super::types::*;
use crate::core::types::Size;

/// Block allocator interface shared by every strategy
///
/// Calls are single-threaded; wrap an instance in
/// [`SharedAllocator`](super::SharedAllocator) to serialize access from
/// several threads.
pub trait Allocator {
    /// Allocate `size` bytes, possibly acquiring a page from the provider
    fn allocate(&mut self, size: Size) -> AllocResult<Pointer>;

    /// Release a pointer previously returned by `allocate(size)`
    ///
    /// Passing a pointer that is not live, or a size different from the one
    /// used to allocate it, is a caller error and is only caught by debug
    /// assertions.
    fn release(&mut self, ptr: Pointer, size: Size);

    /// Number of pages currently owned by this allocator
    fn pages_held(&self) -> usize;

    /// Largest size `allocate` accepts
    fn max_request(&self) -> Size;

    /// Snapshot of allocator statistics
    fn stats(&self) -> AllocatorStats;
}

/// Source of fixed-size pages
pub trait PageProvider {
    /// Size of every page this provider hands out
    fn page_size(&self) -> Size;

    /// Obtain an exclusively owned page
    fn obtain_page(&mut self) -> Page;

    /// Return a page obtained from this provider
    fn release_page(&mut self, page: Page);
}

impl<P: PageProvider + ?Sized> PageProvider for Box<P> {
    fn page_size(&self) -> Size {
        (**self).page_size()
    }

    fn obtain_page(&mut self) -> Page {
        (**self).obtain_page()
    }

    fn release_page(&mut self, page: Page) {
        (**self).release_page(page)
    }
}
