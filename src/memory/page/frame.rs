/*!
 * Page Frames
 * Exclusively owned byte arenas backing every page
 */

use crate::core::types::{Address, PageId, Size};
use crate::memory::types::Pointer;
use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::slice;

/// A fixed-size page of memory
///
/// The frame is owned by whoever holds the `Page`; the bytes are freed when it
/// is dropped. Intrusive headers are read and written through the
/// little-endian accessors, the payload region is reached only through
/// [`Pointer`]s handed to the host.
pub struct Page {
    id: PageId,
    ptr: NonNull<u8>,
    layout: Layout,
}

// The frame is uniquely owned; moving a Page moves that ownership.
unsafe impl Send for Page {}

impl Page {
    /// Allocate a zeroed frame for `layout`
    ///
    /// Aborts through `handle_alloc_error` if the system allocator is
    /// exhausted; provider exhaustion is not modelled by the strategies.
    pub fn with_layout(id: PageId, layout: Layout) -> Self {
        debug_assert!(layout.size() > 0);
        // SAFETY: layout has a non-zero size
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = match NonNull::new(raw) {
            Some(ptr) => ptr,
            None => alloc::handle_alloc_error(layout),
        };
        Self { id, ptr, layout }
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.id
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.layout.size()
    }

    /// Address of the first byte
    #[inline]
    pub fn base(&self) -> Address {
        self.ptr.as_ptr() as Address
    }

    #[inline]
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.base() && addr < self.base() + self.size()
    }

    /// Host-facing pointer to `offset` bytes into the page
    #[inline]
    pub fn pointer_at(&self, offset: usize) -> Pointer {
        assert!(offset < self.size(), "offset 0x{:x} outside {}", offset, self.id);
        // SAFETY: offset is within the allocation, so the result is non-null and in bounds
        Pointer::new(unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(offset)) })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: ptr is valid for layout.size() bytes for the lifetime of self
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.size()) }
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size()) }
    }

    #[inline]
    pub fn read_u8(&self, offset: usize) -> u8 {
        self.bytes()[offset]
    }

    #[inline]
    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.bytes_mut()[offset] = value;
    }

    #[inline]
    pub fn read_u16(&self, offset: usize) -> u16 {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(&self.bytes()[offset..offset + 2]);
        u16::from_le_bytes(buf)
    }

    #[inline]
    pub fn write_u16(&mut self, offset: usize, value: u16) {
        self.bytes_mut()[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes()[offset..offset + 4]);
        u32::from_le_bytes(buf)
    }

    #[inline]
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.bytes_mut()[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn read_u64(&self, offset: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes()[offset..offset + 8]);
        u64::from_le_bytes(buf)
    }

    #[inline]
    pub fn write_u64(&mut self, offset: usize, value: u64) {
        self.bytes_mut()[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with exactly this layout
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("base", &format_args!("0x{:x}", self.base()))
            .field("size", &self.size())
            .finish()
    }
}
