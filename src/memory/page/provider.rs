/*!
 * Heap Page Provider
 * Default page source backed by the system allocator
 */

use super::frame::Page;
use crate::core::limits::MAX_FRAME_ALIGN;
use crate::core::types::{PageId, Size};
use crate::memory::config::{validate_page_size, ConfigError};
use crate::memory::traits::PageProvider;
use ahash::RandomState;
use std::alloc::Layout;
use std::collections::HashSet;
use tracing::debug;

/// Page provider that hands out zeroed heap frames
///
/// Keeps counters of obtained/released pages so hosts and tests can check
/// that an allocator returned everything it took.
#[derive(Debug)]
pub struct HeapPageProvider {
    layout: Layout,
    next_id: u32,
    outstanding: HashSet<PageId, RandomState>,
    obtained: usize,
    released: usize,
}

impl HeapPageProvider {
    pub fn new(page_size: Size) -> Result<Self, ConfigError> {
        validate_page_size(page_size)?;
        let layout = Layout::from_size_align(page_size, page_size.min(MAX_FRAME_ALIGN)).map_err(
            |_| ConfigError::InvalidPageSize {
                size: page_size,
                reason: "not representable as a memory layout".into(),
            },
        )?;
        Ok(Self {
            layout,
            next_id: 1,
            outstanding: HashSet::with_hasher(RandomState::new()),
            obtained: 0,
            released: 0,
        })
    }

    /// Total pages handed out since creation
    pub fn obtained(&self) -> usize {
        self.obtained
    }

    /// Total pages returned since creation
    pub fn released(&self) -> usize {
        self.released
    }

    /// Pages currently handed out
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }
}

impl PageProvider for HeapPageProvider {
    fn page_size(&self) -> Size {
        self.layout.size()
    }

    fn obtain_page(&mut self) -> Page {
        let id = PageId::from_raw(self.next_id)
            .unwrap_or_else(|| panic!("page id space exhausted"));
        self.next_id = self.next_id.wrapping_add(1);

        let page = Page::with_layout(id, self.layout);
        self.outstanding.insert(id);
        self.obtained += 1;
        debug!(page = %id, base = page.base(), "page obtained");
        page
    }

    fn release_page(&mut self, page: Page) {
        let known = self.outstanding.remove(&page.id());
        debug_assert!(known, "{} released twice or never obtained", page.id());
        self.released += 1;
        debug!(page = %page.id(), "page released");
    }
}
