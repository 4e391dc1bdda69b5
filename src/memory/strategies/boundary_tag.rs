/*!
 * Boundary-Tag Resource Map
 *
 * All blocks, free and allocated, are threaded in physical order on one
 * doubly linked chain that runs through every page. Allocation is first-fit
 * with splitting; release coalesces eagerly with free neighbors on the same
 * page, so no two adjacent blocks of a page are ever both free. A block's
 * capacity is not stored: it is the distance to the next block on the page,
 * or to the end of the page.
 *
 * ## Layout
 *
 * Each page starts with an 8-byte back-reference to its own id, followed by
 * block headers (24 bytes each):
 *
 * | offset | field                 |
 * |--------|-----------------------|
 * | 0      | free flag (u8)        |
 * | 8      | prev block (packed)   |
 * | 16     | next block (packed)   |
 */

use crate::core::limits::{align_up, PAYLOAD_ALIGN};
use crate::core::types::{BlockRef, PageId, Size};
use crate::memory::config::{validate_page_size, ConfigError, StrategyKind};
use crate::memory::page::PageTable;
use crate::memory::traits::{Allocator, PageProvider};
use crate::memory::types::{AllocError, AllocResult, AllocatorStats, Pointer};
use serde::Serialize;
use tracing::{debug, trace, warn};

/// Page back-reference footprint
pub const PAGE_REF: usize = 8;

/// Per-block header footprint
pub const BLOCK_HEADER: usize = 24;

const FREE: usize = 0;
const PREV: usize = 8;
const NEXT: usize = 16;

/// One entry of the block chain, as seen by [`BoundaryTagAllocator::block_map`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockInfo {
    pub page: PageId,
    pub offset: usize,
    pub capacity: Size,
    pub free: bool,
}

/// First-fit allocator over a physically ordered block chain
pub struct BoundaryTagAllocator<P: PageProvider> {
    provider: P,
    pages: PageTable,
    page_size: Size,
    /// First block of the first page
    head: Option<BlockRef>,
    live: usize,
}

impl<P: PageProvider> BoundaryTagAllocator<P> {
    pub fn new(provider: P) -> Result<Self, ConfigError> {
        let page_size = provider.page_size();
        validate_page_size(page_size)?;
        Ok(Self {
            provider,
            pages: PageTable::new(),
            page_size,
            head: None,
            live: 0,
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Owning page and offset of a pointer handed out by this allocator
    pub fn locate(&self, ptr: Pointer) -> Option<(PageId, usize)> {
        self.pages.locate(ptr.addr())
    }

    /// Capacity of a block spanning a whole page
    pub fn page_capacity(&self) -> Size {
        self.page_size - PAGE_REF - BLOCK_HEADER
    }

    /// Walk the whole chain
    pub fn block_map(&self) -> Vec<BlockInfo> {
        let mut out = Vec::new();
        let mut cur = self.head;
        while let Some(block) = cur {
            out.push(BlockInfo {
                page: block.page,
                offset: block.offset(),
                capacity: self.capacity(block),
                free: self.is_free(block),
            });
            cur = self.next(block);
        }
        out
    }

    fn is_free(&self, block: BlockRef) -> bool {
        self.pages[block.page].read_u8(block.offset() + FREE) != 0
    }

    fn set_free(&mut self, block: BlockRef, free: bool) {
        self.pages[block.page].write_u8(block.offset() + FREE, free as u8);
    }

    fn prev(&self, block: BlockRef) -> Option<BlockRef> {
        BlockRef::unpack(self.pages[block.page].read_u64(block.offset() + PREV))
    }

    fn set_prev(&mut self, block: BlockRef, prev: Option<BlockRef>) {
        self.pages[block.page].write_u64(block.offset() + PREV, BlockRef::pack(prev));
    }

    fn next(&self, block: BlockRef) -> Option<BlockRef> {
        BlockRef::unpack(self.pages[block.page].read_u64(block.offset() + NEXT))
    }

    fn set_next(&mut self, block: BlockRef, next: Option<BlockRef>) {
        self.pages[block.page].write_u64(block.offset() + NEXT, BlockRef::pack(next));
    }

    fn write_block(
        &mut self,
        block: BlockRef,
        free: bool,
        prev: Option<BlockRef>,
        next: Option<BlockRef>,
    ) {
        self.set_free(block, free);
        self.set_prev(block, prev);
        self.set_next(block, next);
    }

    /// Offset where the block after `block` on the same page starts
    fn limit(&self, block: BlockRef) -> usize {
        match self.next(block) {
            Some(next) if next.page == block.page => next.offset(),
            _ => self.page_size,
        }
    }

    fn capacity(&self, block: BlockRef) -> Size {
        self.limit(block) - block.offset() - BLOCK_HEADER
    }

    /// Free neighbor on the same page; pages are never physically adjacent
    fn free_neighbor(&self, block: BlockRef, neighbor: Option<BlockRef>) -> Option<BlockRef> {
        neighbor.filter(|n| n.page == block.page && self.is_free(*n))
    }

    /// Obtain a page holding one free block linked after `prev`
    fn add_page(&mut self, prev: Option<BlockRef>) -> BlockRef {
        let mut page = self.provider.obtain_page();
        let id = page.id();
        page.write_u32(0, id.get());
        self.pages.insert(page);

        let first = BlockRef::new(id, PAGE_REF);
        self.write_block(first, true, prev, None);
        match prev {
            Some(prev) => self.set_next(prev, Some(first)),
            None => self.head = Some(first),
        }
        debug!(page = %id, "resource-map page added");
        first
    }

    fn first_fit(&mut self, size: Size) -> BlockRef {
        let mut cur = match self.head {
            Some(head) => head,
            None => self.add_page(None),
        };
        loop {
            if self.is_free(cur) && self.capacity(cur) >= size {
                return cur;
            }
            cur = match self.next(cur) {
                Some(next) => next,
                None => self.add_page(Some(cur)),
            };
        }
    }

    /// Detach a page whose only block is free and hand it back
    fn retire_page(&mut self, first: BlockRef) {
        let prev = self.prev(first);
        let next = self.next(first);
        if let Some(prev) = prev {
            self.set_next(prev, next);
        }
        if let Some(next) = next {
            self.set_prev(next, prev);
        }
        if self.head == Some(first) {
            self.head = next;
        }
        if let Some(page) = self.pages.remove(first.page) {
            self.provider.release_page(page);
        }
        debug!(page = %first.page, "resource-map page returned");
    }
}

impl<P: PageProvider> Allocator for BoundaryTagAllocator<P> {
    fn allocate(&mut self, size: Size) -> AllocResult<Pointer> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        if size > self.max_request() {
            warn!(size, limit = self.max_request(), "resource-map allocation too large");
            return Err(AllocError::TooLarge {
                requested: size,
                limit: self.max_request(),
            });
        }

        let block = self.first_fit(size);
        self.set_free(block, false);

        let split = align_up(block.offset() + BLOCK_HEADER + size, PAYLOAD_ALIGN);
        let limit = self.limit(block);
        if limit > split && limit - split > BLOCK_HEADER {
            let rest = BlockRef::new(block.page, split);
            let next = self.next(block);
            self.write_block(rest, true, Some(block), next);
            if let Some(next) = next {
                self.set_prev(next, Some(rest));
            }
            self.set_next(block, Some(rest));
        }

        self.live += 1;
        trace!(size, block = %block, "resource-map allocate");
        Ok(self.pages[block.page].pointer_at(block.offset() + BLOCK_HEADER))
    }

    fn release(&mut self, ptr: Pointer, size: Size) {
        let located = self.pages.locate(ptr.addr());
        debug_assert!(located.is_some(), "{:?} was not allocated here", ptr);
        let Some((page, offset)) = located else {
            return;
        };
        let block = BlockRef::new(page, offset - BLOCK_HEADER);
        debug_assert!(!self.is_free(block), "{} released twice", block);
        debug_assert!(self.capacity(block) >= size, "release size mismatch");
        self.live = self.live.saturating_sub(1);

        let prev = self.free_neighbor(block, self.prev(block));
        let next = self.free_neighbor(block, self.next(block));
        match (prev, next) {
            (Some(prev), Some(next)) => {
                let after = self.next(next);
                self.set_next(prev, after);
                if let Some(after) = after {
                    self.set_prev(after, Some(prev));
                }
            }
            (Some(prev), None) => {
                let after = self.next(block);
                self.set_next(prev, after);
                if let Some(after) = after {
                    self.set_prev(after, Some(prev));
                }
            }
            (None, Some(next)) => {
                let after = self.next(next);
                self.set_free(block, true);
                self.set_next(block, after);
                if let Some(after) = after {
                    self.set_prev(after, Some(block));
                }
            }
            (None, None) => self.set_free(block, true),
        }
        trace!(size, block = %block, "resource-map release");

        let first = BlockRef::new(page, PAGE_REF);
        if self.is_free(first) && self.capacity(first) == self.page_capacity() {
            self.retire_page(first);
        }
    }

    fn pages_held(&self) -> usize {
        self.pages.len()
    }

    fn max_request(&self) -> Size {
        self.page_capacity()
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            strategy: StrategyKind::BoundaryTag,
            page_size: self.page_size,
            pages_held: self.pages.len(),
            live_allocations: self.live,
            max_request: self.max_request(),
        }
    }
}

impl<P: PageProvider> Drop for BoundaryTagAllocator<P> {
    fn drop(&mut self) {
        for page in self.pages.drain() {
            self.provider.release_page(page);
        }
    }
}
