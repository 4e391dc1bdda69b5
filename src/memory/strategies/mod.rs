/*!
 * Allocation Strategies
 * Three interchangeable implementations of the allocator contract
 */

pub mod boundary_tag;
pub mod buddy;
pub mod free_list;

pub use boundary_tag::{BlockInfo, BoundaryTagAllocator};
pub use buddy::{BuddyAllocator, TreeLayout};
pub use free_list::FreeListAllocator;
