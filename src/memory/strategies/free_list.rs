/*!
 * Segregated Power-of-Two Free Lists
 *
 * One singly linked free list per power-of-two size class (16 bytes up to the
 * page size). The class descriptors themselves live on a bootstrap page, the
 * "ladder": a root record followed by one descriptor per class, each linked to
 * the next larger class. A descriptor shares its layout with a block header,
 * so the descriptor's list head is simply the link word of the list's first
 * node.
 *
 * ## Block header (16 bytes, at the start of every block)
 *
 * | offset | field                                               |
 * |--------|-----------------------------------------------------|
 * | 0      | class size (u32)                                    |
 * | 4      | owning page id (u32)                                |
 * | 8      | link: next free block, or class descriptor if live  |
 *
 * Descriptors append an `up` link (u64) at offset 16.
 */

use crate::core::limits::MIN_SIZE_CLASS;
use crate::core::types::{BlockRef, PageId, Size};
use crate::memory::config::{validate_page_size, ConfigError, StrategyKind};
use crate::memory::page::PageTable;
use crate::memory::traits::{Allocator, PageProvider};
use crate::memory::types::{AllocError, AllocResult, AllocatorStats, Pointer};
use tracing::{debug, trace, warn};

/// Per-block header footprint
pub const BLOCK_HEADER: usize = 16;

/// Class descriptor footprint on the ladder page
pub const CLASS_RECORD: usize = 24;

const SIZE: usize = 0;
const OWNER: usize = 4;
const LINK: usize = 8;
const UP: usize = 16;

/// Free-list allocator over power-of-two size classes
pub struct FreeListAllocator<P: PageProvider> {
    provider: P,
    pages: PageTable,
    page_size: Size,
    /// Bootstrap page holding the class descriptors
    ladder: Option<PageId>,
    /// Pages striped into blocks, ladder excluded
    managed: usize,
    live: usize,
}

impl<P: PageProvider> FreeListAllocator<P> {
    pub fn new(provider: P) -> Result<Self, ConfigError> {
        let page_size = provider.page_size();
        validate_page_size(page_size)?;
        Ok(Self {
            provider,
            pages: PageTable::new(),
            page_size,
            ladder: None,
            managed: 0,
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

    /// Size class serving a request, `None` if it cannot fit in a page
    pub fn class_for(&self, size: Size) -> Option<Size> {
        let rounded = size
            .checked_add(BLOCK_HEADER)?
            .checked_next_power_of_two()?
            .max(MIN_SIZE_CLASS);
        (rounded <= self.page_size).then_some(rounded)
    }

    /// Whether the ladder page is currently installed
    pub fn is_bootstrapped(&self) -> bool {
        self.ladder.is_some()
    }

    /// Number of free blocks queued on a class list
    pub fn free_blocks(&self, class: Size) -> usize {
        let Some(desc) = self.find_class(class) else {
            return 0;
        };
        let mut count = 0;
        let mut cur = self.link(desc);
        while let Some(block) = cur {
            count += 1;
            cur = self.link(block);
        }
        count
    }

    fn size_of(&self, block: BlockRef) -> Size {
        self.pages[block.page].read_u32(block.offset() + SIZE) as Size
    }

    fn owner(&self, block: BlockRef) -> Option<PageId> {
        PageId::from_raw(self.pages[block.page].read_u32(block.offset() + OWNER))
    }

    fn link(&self, block: BlockRef) -> Option<BlockRef> {
        BlockRef::unpack(self.pages[block.page].read_u64(block.offset() + LINK))
    }

    fn set_link(&mut self, block: BlockRef, link: Option<BlockRef>) {
        self.pages[block.page].write_u64(block.offset() + LINK, BlockRef::pack(link));
    }

    fn up(&self, desc: BlockRef) -> Option<BlockRef> {
        BlockRef::unpack(self.pages[desc.page].read_u64(desc.offset() + UP))
    }

    fn write_header(&mut self, block: BlockRef, size: Size, link: Option<BlockRef>) {
        let page = &mut self.pages[block.page];
        page.write_u32(block.offset() + SIZE, size as u32);
        page.write_u32(block.offset() + OWNER, block.page.get());
        page.write_u64(block.offset() + LINK, BlockRef::pack(link));
    }

    /// Lay down the root record and one descriptor per class
    fn bootstrap(&mut self) {
        let id = self.pages.insert(self.provider.obtain_page());
        let mut offset = 0;
        let mut class = 0;
        loop {
            let next = if class == 0 { MIN_SIZE_CLASS } else { class << 1 };
            let up = (next <= self.page_size).then(|| BlockRef::new(id, offset + CLASS_RECORD));
            self.write_header(BlockRef::new(id, offset), class, None);
            self.pages[id].write_u64(offset + UP, BlockRef::pack(up));
            if up.is_none() {
                break;
            }
            offset += CLASS_RECORD;
            class = next;
        }
        self.ladder = Some(id);
        debug!(page = %id, classes = offset / CLASS_RECORD, "size-class ladder installed");
    }

    /// Walk the ladder to the descriptor of `class`
    fn find_class(&self, class: Size) -> Option<BlockRef> {
        let root = BlockRef::new(self.ladder?, 0);
        let mut cur = self.up(root);
        while let Some(desc) = cur {
            if self.size_of(desc) >= class {
                return Some(desc);
            }
            cur = self.up(desc);
        }
        None
    }

    /// Stripe a fresh page into equal blocks and hang them off `desc`
    fn refill(&mut self, desc: BlockRef, class: Size) -> BlockRef {
        let id = self.pages.insert(self.provider.obtain_page());
        self.managed += 1;

        let count = self.page_size / class;
        for i in 0..count {
            let next = (i + 1 < count).then(|| BlockRef::new(id, (i + 1) * class));
            self.write_header(BlockRef::new(id, i * class), class, next);
        }
        let first = BlockRef::new(id, 0);
        self.set_link(desc, Some(first));
        debug!(page = %id, class, blocks = count, "page striped into size class");
        first
    }

    /// Unlink every block of `page` from the list rooted at `desc`
    fn evict(&mut self, desc: BlockRef, page: PageId) {
        let mut prev = desc;
        let mut cur = self.link(desc);
        while let Some(block) = cur {
            let next = self.link(block);
            if self.owner(block) == Some(page) {
                self.set_link(prev, next);
            } else {
                prev = block;
            }
            cur = next;
        }
    }

    fn release_page(&mut self, id: PageId) {
        if let Some(page) = self.pages.remove(id) {
            self.provider.release_page(page);
        }
    }
}

impl<P: PageProvider> Allocator for FreeListAllocator<P> {
    fn allocate(&mut self, size: Size) -> AllocResult<Pointer> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        let Some(class) = self.class_for(size) else {
            warn!(size, limit = self.max_request(), "free-list allocation too large");
            return Err(AllocError::TooLarge {
                requested: size,
                limit: self.max_request(),
            });
        };

        if self.ladder.is_none() {
            self.bootstrap();
        }
        let desc = match self.find_class(class) {
            Some(desc) => desc,
            None => unreachable!("ladder covers every class up to the page size"),
        };

        let block = match self.link(desc) {
            Some(block) => block,
            None => self.refill(desc, class),
        };
        let next = self.link(block);
        self.set_link(desc, next);
        // A live block points back at its class so release can find the list
        self.set_link(block, Some(desc));
        self.live += 1;

        let ptr = self.pages[block.page].pointer_at(block.offset() + BLOCK_HEADER);
        trace!(size, class, block = %block, "free-list allocate");
        Ok(ptr)
    }

    fn release(&mut self, ptr: Pointer, size: Size) {
        let located = self.pages.locate(ptr.addr());
        debug_assert!(located.is_some(), "{:?} was not allocated here", ptr);
        let Some((page, offset)) = located else {
            return;
        };
        let block = BlockRef::new(page, offset - BLOCK_HEADER);
        let class = self.size_of(block);
        debug_assert_eq!(Some(class), self.class_for(size), "release size mismatch");

        let desc = self.link(block);
        debug_assert!(desc.is_some(), "{} has no class back-reference", block);
        let Some(desc) = desc else {
            return;
        };
        let head = self.link(desc);
        self.set_link(block, head);
        self.set_link(desc, Some(block));
        self.live = self.live.saturating_sub(1);
        trace!(size, class, block = %block, "free-list release");

        let mut free_on_page = 0;
        let mut cur = Some(block);
        while let Some(b) = cur {
            if self.owner(b) == Some(page) {
                free_on_page += self.size_of(b);
            }
            cur = self.link(b);
        }

        if free_on_page >= self.page_size {
            self.evict(desc, page);
            self.release_page(page);
            self.managed -= 1;
            debug!(page = %page, class, "fully free page returned");
        }

        if self.managed == 0 {
            if let Some(ladder) = self.ladder.take() {
                self.release_page(ladder);
                debug!(page = %ladder, "size-class ladder released");
            }
        }
    }

    fn pages_held(&self) -> usize {
        self.pages.len()
    }

    fn max_request(&self) -> Size {
        self.page_size - BLOCK_HEADER
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            strategy: StrategyKind::FreeList,
            page_size: self.page_size,
            pages_held: self.pages.len(),
            live_allocations: self.live,
            max_request: self.max_request(),
        }
    }
}

impl<P: PageProvider> Drop for FreeListAllocator<P> {
    fn drop(&mut self) {
        for page in self.pages.drain() {
            self.provider.release_page(page);
        }
    }
}
