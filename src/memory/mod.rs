/*!
 * Memory Module
 *
 * Page-backed block allocators exposing `allocate(size)` / `release(ptr, size)`
 * over fixed-size pages obtained from a [`PageProvider`].
 *
 * ## Strategies
 *
 * - **Free list** ([`FreeListAllocator`]): segregated power-of-two size
 *   classes, O(1) allocate, release scans the class list to detect a fully
 *   free page.
 * - **Buddy** ([`BuddyAllocator`]): per-page segment tree of longest free
 *   runs, O(log n) split and merge.
 * - **Boundary tag** ([`BoundaryTagAllocator`]): first-fit over a physically
 *   ordered block chain with eager neighbor coalescing.
 *
 * Every strategy returns a page to its provider the moment the page holds no
 * live allocation, and never earlier.
 */

pub mod config;
pub mod dispatch;
pub mod page;
pub mod shared;
pub mod strategies;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use config::{AllocatorConfig, ConfigError, StrategyKind};
pub use dispatch::AnyAllocator;
pub use page::{HeapPageProvider, Page, PageTable};
pub use shared::SharedAllocator;
pub use strategies::{BlockInfo, BoundaryTagAllocator, BuddyAllocator, FreeListAllocator, TreeLayout};
pub use traits::*;
pub use types::*;
