/*!
 * Binary Buddy System
 *
 * Every page starts with a header holding a link to the next page, a
 * "large allocation" flag and a segment tree of `2N - 1` 16-bit counters,
 * `N = page_size / MIN_BUDDY_BLOCK`. Node `i` covers a power-of-two range of
 * the page and its counter is the longest free run fully inside that range,
 * net of any overlap with the header itself:
 *
 * - `0`: the range is allocated as one unit (or buried under the header)
 * - real node capacity: the range is completely free
 * - anything else: `max(left, right)`
 *
 * Allocation and release are both `O(log N)`.
 *
 * ## Header
 *
 * | offset | field                          |
 * |--------|--------------------------------|
 * | 0      | next page id (u32, 0 = none)   |
 * | 4      | large flag (u8)                |
 * | 8      | counters, u16 per tree node    |
 */

use crate::core::limits::{align_up, MIN_BUDDY_BLOCK, PAYLOAD_ALIGN};
use crate::core::types::{PageId, Size};
use crate::memory::config::{validate_page_size, ConfigError, StrategyKind};
use crate::memory::page::{Page, PageTable};
use crate::memory::traits::{Allocator, PageProvider};
use crate::memory::types::{AllocError, AllocResult, AllocatorStats, Pointer};
use tracing::{debug, trace, warn};

/// Header of a page dedicated to one oversized allocation
pub const LARGE_HEADER: usize = 8;

const NEXT: usize = 0;
const LARGE: usize = 4;
const COUNTERS: usize = 8;

/// Segment-tree geometry derived from the page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLayout {
    pub page_size: Size,
    /// Number of minimum-size blocks per page
    pub leaves: usize,
    /// Page header footprint, padded to the payload alignment
    pub header: Size,
}

impl TreeLayout {
    pub fn new(page_size: Size) -> Self {
        let leaves = page_size / MIN_BUDDY_BLOCK;
        let header = align_up(COUNTERS + 2 * (2 * leaves - 1), PAYLOAD_ALIGN);
        Self {
            page_size,
            leaves,
            header,
        }
    }

    #[inline]
    pub fn nodes(&self) -> usize {
        2 * self.leaves - 1
    }

    /// Byte offset of node `index` whose range is `node_size` bytes
    #[inline]
    pub fn offset_of(&self, index: usize, node_size: Size) -> usize {
        (index + 1) * node_size - self.page_size
    }

    /// Node covering `offset` at the level of `node_size`
    #[inline]
    pub fn index_of(&self, offset: usize, node_size: Size) -> usize {
        (offset + self.page_size) / node_size - 1
    }

    /// Range size of node `index`
    #[inline]
    pub fn node_size(&self, index: usize) -> Size {
        let depth = usize::BITS - 1 - (index + 1).leading_zeros();
        self.page_size >> depth
    }

    /// Capacity of a node once the header's footprint is subtracted
    #[inline]
    pub fn real_size(&self, index: usize, node_size: Size) -> Size {
        let offset = self.offset_of(index, node_size);
        if self.header > offset {
            node_size.saturating_sub(self.header - offset)
        } else {
            node_size
        }
    }

    /// Usable capacity of a whole page
    #[inline]
    pub fn usable(&self) -> Size {
        self.page_size - self.header
    }
}

#[inline]
fn parent(index: usize) -> usize {
    (index + 1) / 2 - 1
}

#[inline]
fn left(index: usize) -> usize {
    2 * index + 1
}

#[inline]
fn right(index: usize) -> usize {
    2 * index + 2
}

/// Buddy allocator with one segment tree per page
pub struct BuddyAllocator<P: PageProvider> {
    provider: P,
    pages: PageTable,
    layout: TreeLayout,
    /// Head of the page chain threaded through the headers
    first: Option<PageId>,
    live: usize,
}

impl<P: PageProvider> BuddyAllocator<P> {
    pub fn new(provider: P) -> Result<Self, ConfigError> {
        let page_size = provider.page_size();
        validate_page_size(page_size)?;
        Ok(Self {
            provider,
            pages: PageTable::new(),
            layout: TreeLayout::new(page_size),
            first: None,
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

    pub fn layout(&self) -> TreeLayout {
        self.layout
    }

    /// Counter of tree node `index` on `page`, `None` if the page is not held
    pub fn longest_free(&self, page: PageId, index: usize) -> Option<u16> {
        if index >= self.layout.nodes() {
            return None;
        }
        self.pages.get(page).map(|p| counter(p, index))
    }

    /// Pages in chain order
    pub fn chain(&self) -> Vec<PageId> {
        let mut out = Vec::new();
        let mut cur = self.first;
        while let Some(id) = cur {
            out.push(id);
            cur = self.next_page(id);
        }
        out
    }

    fn next_page(&self, id: PageId) -> Option<PageId> {
        PageId::from_raw(self.pages[id].read_u32(NEXT))
    }

    fn set_next_page(&mut self, id: PageId, next: Option<PageId>) {
        self.pages[id].write_u32(NEXT, PageId::encode(next));
    }

    fn is_large(&self, id: PageId) -> bool {
        self.pages[id].read_u8(LARGE) != 0
    }

    /// Seed the leaves with their real capacity and fold upward
    fn init_header(&self, page: &mut Page) {
        let layout = self.layout;
        page.write_u32(NEXT, 0);
        page.write_u8(LARGE, 0);
        for index in layout.leaves - 1..layout.nodes() {
            let real = layout.real_size(index, MIN_BUDDY_BLOCK);
            set_counter(page, index, real);
        }
        for index in (0..layout.leaves - 1).rev() {
            let node_size = layout.node_size(index);
            let merged = merge(&layout, page, index, node_size);
            set_counter(page, index, merged);
        }
    }

    /// Obtain a page, initialize its header and append it to the chain
    fn append_page(&mut self) -> PageId {
        let mut page = self.provider.obtain_page();
        self.init_header(&mut page);
        let id = self.pages.insert(page);

        match self.chain().last() {
            Some(&last) => self.set_next_page(last, Some(id)),
            None => self.first = Some(id),
        }
        debug!(page = %id, header = self.layout.header, "buddy page added");
        id
    }

    /// First non-large page whose root can hold `size`, appending one if none can
    fn find_page(&mut self, size: Size) -> PageId {
        let mut cur = self.first;
        while let Some(id) = cur {
            if !self.is_large(id) && counter(&self.pages[id], 0) as usize >= size {
                return id;
            }
            cur = self.next_page(id);
        }
        self.append_page()
    }

    fn unlink_page(&mut self, id: PageId) {
        let next = self.next_page(id);
        if self.first == Some(id) {
            self.first = next;
        } else {
            let mut cur = self.first;
            while let Some(prev) = cur {
                let after = self.next_page(prev);
                if after == Some(id) {
                    self.set_next_page(prev, next);
                    break;
                }
                cur = after;
            }
        }
        if let Some(page) = self.pages.remove(id) {
            self.provider.release_page(page);
        }
        debug!(page = %id, "buddy page returned");
    }

    fn allocate_large(&mut self, size: Size) -> Pointer {
        let id = self.append_page();
        self.pages[id].write_u8(LARGE, 1);
        self.live += 1;
        trace!(size, page = %id, "buddy large allocate");
        self.pages[id].pointer_at(LARGE_HEADER)
    }
}

#[inline]
fn counter(page: &Page, index: usize) -> u16 {
    page.read_u16(COUNTERS + 2 * index)
}

#[inline]
fn set_counter(page: &mut Page, index: usize, value: Size) {
    debug_assert!(value <= u16::MAX as usize);
    page.write_u16(COUNTERS + 2 * index, value as u16);
}

/// Counter of an internal node: coalesced if both children are fully free
#[inline]
fn merge(layout: &TreeLayout, page: &Page, index: usize, node_size: Size) -> Size {
    let l = counter(page, left(index)) as usize;
    let r = counter(page, right(index)) as usize;
    let real = layout.real_size(index, node_size);
    if l + r == real {
        real
    } else {
        l.max(r)
    }
}

impl<P: PageProvider> Allocator for BuddyAllocator<P> {
    fn allocate(&mut self, size: Size) -> AllocResult<Pointer> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        if size > self.max_request() {
            warn!(size, limit = self.max_request(), "buddy allocation too large");
            return Err(AllocError::TooLarge {
                requested: size,
                limit: self.max_request(),
            });
        }
        if size > self.layout.usable() {
            return Ok(self.allocate_large(size));
        }

        let unit = size.next_power_of_two().max(MIN_BUDDY_BLOCK);
        let id = self.find_page(size);
        let layout = self.layout;
        let page = &mut self.pages[id];

        let mut index = 0;
        let mut node_size = layout.page_size;
        while node_size != unit {
            index = if counter(page, left(index)) as usize >= size {
                left(index)
            } else {
                right(index)
            };
            node_size /= 2;
        }

        let free = counter(page, index) as usize;
        debug_assert!(free >= size, "descent reached a node too small for {}", size);
        let offset = layout.offset_of(index, node_size) + node_size - free;
        set_counter(page, index, 0);

        while index != 0 {
            index = parent(index);
            let l = counter(page, left(index));
            let r = counter(page, right(index));
            set_counter(page, index, l.max(r) as usize);
        }

        self.live += 1;
        trace!(size, unit, page = %id, offset, "buddy allocate");
        Ok(page.pointer_at(offset))
    }

    fn release(&mut self, ptr: Pointer, size: Size) {
        let located = self.pages.locate(ptr.addr());
        debug_assert!(located.is_some(), "{:?} was not allocated here", ptr);
        let Some((id, offset)) = located else {
            return;
        };
        self.live = self.live.saturating_sub(1);

        if self.is_large(id) {
            trace!(size, page = %id, "buddy large release");
            self.unlink_page(id);
            return;
        }

        let layout = self.layout;
        let page = &mut self.pages[id];
        let mut node_size = MIN_BUDDY_BLOCK;
        let mut index = layout.index_of(offset - offset % MIN_BUDDY_BLOCK, node_size);

        // The allocated unit is the lowest ancestor whose counter is zero
        while counter(page, index) != 0 {
            debug_assert!(index != 0, "{:?} is not an allocated unit", ptr);
            if index == 0 {
                return;
            }
            index = parent(index);
            node_size *= 2;
        }
        debug_assert_eq!(
            node_size,
            size.next_power_of_two().max(MIN_BUDDY_BLOCK),
            "release size mismatch"
        );

        set_counter(page, index, layout.real_size(index, node_size));
        while index != 0 {
            index = parent(index);
            node_size *= 2;
            let merged = merge(&layout, page, index, node_size);
            set_counter(page, index, merged);
        }
        trace!(size, page = %id, offset, "buddy release");

        if counter(page, 0) as usize == layout.usable() {
            self.unlink_page(id);
        }
    }

    fn pages_held(&self) -> usize {
        self.pages.len()
    }

    fn max_request(&self) -> Size {
        self.layout.page_size - LARGE_HEADER
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            strategy: StrategyKind::Buddy,
            page_size: self.layout.page_size,
            pages_held: self.pages.len(),
            live_allocations: self.live,
            max_request: self.max_request(),
        }
    }
}

impl<P: PageProvider> Drop for BuddyAllocator<P> {
    fn drop(&mut self) {
        for page in self.pages.drain() {
            self.provider.release_page(page);
        }
    }
}
