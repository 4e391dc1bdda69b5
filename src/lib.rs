/*!
 * Kernel Memory Allocator Library
 * Page-backed free-list, buddy and boundary-tag allocators
 */

pub mod core;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use crate::core::types::{Address, BlockRef, PageId, Size};
pub use memory::{
    AllocError, AllocResult, Allocator, AllocatorConfig, AllocatorStats, AnyAllocator,
    BoundaryTagAllocator, BuddyAllocator, ConfigError, FreeListAllocator, HeapPageProvider, Page,
    PageProvider, Pointer, SharedAllocator, StrategyKind,
};
pub use monitoring::init_tracing;
