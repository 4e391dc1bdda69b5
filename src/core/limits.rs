/*!
 * System Limits and Constants
 *
 * Centralized location for allocator-wide limits and magic numbers.
 * Every value here is a deployment constant; strategies derive their
 * layouts (segment-tree dimensions, ladder length) from them at construction.
 */

// =============================================================================
// PAGE LIMITS
// =============================================================================

/// Default page size handed out by the page provider (8KB)
pub const DEFAULT_PAGE_SIZE: usize = 8192;

/// Smallest page size accepted by configuration
/// Large enough for the free-list ladder and a buddy header on one page
pub const MIN_PAGE_SIZE: usize = 256;

/// Largest page size accepted by configuration
/// Buddy segment-tree counters are 16-bit, so a fully free page must fit in u16
pub const MAX_PAGE_SIZE: usize = 32768;

/// Alignment cap for page frames
pub const MAX_FRAME_ALIGN: usize = 4096;

// =============================================================================
// BLOCK LIMITS
// =============================================================================

/// Minimum granularity of the buddy strategy (32 bytes)
pub const MIN_BUDDY_BLOCK: usize = 32;

/// Smallest power-of-two size class of the free-list strategy (16 bytes)
pub const MIN_SIZE_CLASS: usize = 16;

/// Alignment of payload pointers that begin at a computed offset
pub const PAYLOAD_ALIGN: usize = 8;

/// Round `value` up to a multiple of `align` (power of two)
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}
