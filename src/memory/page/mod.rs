/*!
 * Pages
 * Page frames, the default provider and per-allocator page tables
 */

mod frame;
mod provider;
mod table;

pub use frame::Page;
pub use provider::HeapPageProvider;
pub use table::PageTable;
