/*!
 * Core Types
 * Common types used across the allocator
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Address type for memory operations
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Stable identifier of a page handed out by a page provider
///
/// Ids are non-zero so that an encoded `0` can stand for "no page" inside
/// intrusive headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(NonZeroU32);

impl PageId {
    pub const fn new(raw: NonZeroU32) -> Self {
        Self(raw)
    }

    /// Build from a raw value, `None` for zero
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Encode an optional page id into a header word
    #[inline]
    pub fn encode(page: Option<PageId>) -> u32 {
        page.map_or(0, PageId::get)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page#{}", self.0)
    }
}

/// Internal reference to a block: owning page plus byte offset into it
///
/// Strategies thread these through their intrusive headers instead of raw
/// addresses. A packed value of `0` means "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub page: PageId,
    pub offset: u32,
}

impl BlockRef {
    pub fn new(page: PageId, offset: usize) -> Self {
        debug_assert!(offset <= u32::MAX as usize);
        Self {
            page,
            offset: offset as u32,
        }
    }

    #[inline]
    pub fn offset(self) -> usize {
        self.offset as usize
    }

    /// Pack into a single header word
    #[inline]
    pub fn pack(link: Option<BlockRef>) -> u64 {
        match link {
            Some(r) => ((r.page.get() as u64) << 32) | r.offset as u64,
            None => 0,
        }
    }

    #[inline]
    pub fn unpack(word: u64) -> Option<BlockRef> {
        let page = PageId::from_raw((word >> 32) as u32)?;
        Some(BlockRef {
            page,
            offset: word as u32,
        })
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+0x{:x}", self.page, self.offset)
    }
}
