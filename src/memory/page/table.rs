/*!
 * Page Table
 * Pages owned by one allocator, indexed by id and by address
 */

use super::frame::Page;
use crate::core::types::{Address, PageId};
use ahash::RandomState;
use std::collections::{BTreeMap, HashMap};
use std::ops::{Index, IndexMut};

/// Pages currently owned by an allocator instance
///
/// `locate` is the single place where a host pointer is turned back into a
/// `(page, offset)` pair.
#[derive(Debug, Default)]
pub struct PageTable {
    pages: HashMap<PageId, Page, RandomState>,
    by_base: BTreeMap<Address, PageId>,
}

impl PageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: Page) -> PageId {
        let id = page.id();
        self.by_base.insert(page.base(), id);
        let previous = self.pages.insert(id, page);
        debug_assert!(previous.is_none(), "{} inserted twice", id);
        id
    }

    pub fn remove(&mut self, id: PageId) -> Option<Page> {
        let page = self.pages.remove(&id)?;
        self.by_base.remove(&page.base());
        Some(page)
    }

    pub fn get(&self, id: PageId) -> Option<&Page> {
        self.pages.get(&id)
    }

    /// Map an address to the owning page and the offset into it
    pub fn locate(&self, addr: Address) -> Option<(PageId, usize)> {
        let (&base, &id) = self.by_base.range(..=addr).next_back()?;
        let page = self.pages.get(&id)?;
        page.contains(addr).then(|| (id, addr - base))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Remove every page, e.g. to hand them back to the provider
    pub fn drain(&mut self) -> Vec<Page> {
        self.by_base.clear();
        self.pages.drain().map(|(_, page)| page).collect()
    }
}

impl Index<PageId> for PageTable {
    type Output = Page;

    fn index(&self, id: PageId) -> &Page {
        match self.pages.get(&id) {
            Some(page) => page,
            None => panic!("{} is not owned by this allocator", id),
        }
    }
}

impl IndexMut<PageId> for PageTable {
    fn index_mut(&mut self, id: PageId) -> &mut Page {
        match self.pages.get_mut(&id) {
            Some(page) => page,
            None => panic!("{} is not owned by this allocator", id),
        }
    }
}
