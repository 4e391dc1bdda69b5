/*!
 * Test Harness
 * Live-range tracking shared by the allocator tests
 */

use kma::{Allocator, AllocatorConfig, AnyAllocator, HeapPageProvider, Pointer, StrategyKind};
use std::collections::BTreeMap;

pub const PAGE_SIZE: usize = 8192;

pub fn build(kind: StrategyKind, page_size: usize) -> AnyAllocator<HeapPageProvider> {
    kma::init_tracing();
    let config = AllocatorConfig::new(kind).with_page_size(page_size);
    AnyAllocator::with_heap_provider(&config).unwrap()
}

struct Live {
    ptr: Pointer,
    size: usize,
    tag: u8,
}

/// Records every live allocation, checks that ranges never overlap and that
/// payload bytes survive untouched until release
#[derive(Default)]
pub struct Tracker {
    live: BTreeMap<usize, Live>,
    issued: usize,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn addresses(&self) -> Vec<usize> {
        self.live.keys().copied().collect()
    }

    pub fn allocate<A: Allocator>(&mut self, alloc: &mut A, size: usize) -> Option<Pointer> {
        let ptr = alloc.allocate(size).ok()?;
        let start = ptr.addr();
        let end = start + size;

        if let Some((&prev, live)) = self.live.range(..=start).next_back() {
            assert!(
                prev + live.size <= start,
                "[0x{:x}, +{}) overlaps [0x{:x}, +{})",
                start,
                size,
                prev,
                live.size
            );
        }
        if let Some((&next, _)) = self.live.range(start..).next() {
            assert!(end <= next, "[0x{:x}, +{}) overlaps 0x{:x}", start, size, next);
        }

        self.issued += 1;
        let tag = (self.issued % 251 + 1) as u8;
        // SAFETY: the allocator just handed out `size` bytes at ptr
        unsafe { ptr.as_ptr().write_bytes(tag, size) };
        self.live.insert(start, Live { ptr, size, tag });
        Some(ptr)
    }

    pub fn release<A: Allocator>(&mut self, alloc: &mut A, addr: usize) {
        let live = self.live.remove(&addr).expect("address is not live");
        // SAFETY: the range stays owned by the test until released below
        let bytes = unsafe { std::slice::from_raw_parts(live.ptr.as_ptr(), live.size) };
        assert!(
            bytes.iter().all(|b| *b == live.tag),
            "payload at 0x{:x} was overwritten",
            addr
        );
        alloc.release(live.ptr, live.size);
    }

    pub fn release_all<A: Allocator>(&mut self, alloc: &mut A) {
        for addr in self.addresses() {
            self.release(alloc, addr);
        }
    }
}
