/*!
 * Strategy Scenario Tests
 * Concrete traces with known page and block outcomes
 */

use crate::harness::PAGE_SIZE;
use kma::memory::strategies::boundary_tag;
use kma::{
    Allocator, BoundaryTagAllocator, BuddyAllocator, FreeListAllocator, HeapPageProvider,
};
use pretty_assertions::assert_eq;

fn provider() -> HeapPageProvider {
    HeapPageProvider::new(PAGE_SIZE).unwrap()
}

#[test]
fn test_free_list_two_small_blocks_share_one_page() {
    let mut alloc = FreeListAllocator::new(provider()).unwrap();
    assert_eq!(alloc.class_for(100), Some(128));

    let a = alloc.allocate(100).unwrap();
    let b = alloc.allocate(100).unwrap();
    // ladder page plus one page striped into 128-byte blocks
    assert_eq!(alloc.provider().obtained(), 2);
    assert_eq!(alloc.locate(a).unwrap().0, alloc.locate(b).unwrap().0);
    assert_eq!(b.addr() - a.addr(), 128);

    alloc.release(a, 100);
    assert_eq!(alloc.provider().released(), 0);
    alloc.release(b, 100);

    // the striped page goes back, and with nothing left to manage so does the ladder
    assert_eq!(alloc.provider().released(), 2);
    assert_eq!(alloc.provider().outstanding(), 0);
    assert!(!alloc.is_bootstrapped());
}

#[test]
fn test_free_list_rebootstraps_after_quiescence() {
    let mut alloc = FreeListAllocator::new(provider()).unwrap();
    let a = alloc.allocate(3000).unwrap();
    alloc.release(a, 3000);
    assert!(!alloc.is_bootstrapped());

    let b = alloc.allocate(3000).unwrap();
    assert!(alloc.is_bootstrapped());
    assert_eq!(alloc.pages_held(), 2);
    alloc.release(b, 3000);
    assert_eq!(alloc.pages_held(), 0);
}

#[test]
fn test_free_list_classes_use_separate_pages() {
    let mut alloc = FreeListAllocator::new(provider()).unwrap();
    let small = alloc.allocate(10).unwrap();
    let medium = alloc.allocate(200).unwrap();
    assert_ne!(alloc.locate(small).unwrap().0, alloc.locate(medium).unwrap().0);
    assert_eq!(alloc.free_blocks(32), PAGE_SIZE / 32 - 1);
    assert_eq!(alloc.free_blocks(256), PAGE_SIZE / 256 - 1);

    alloc.release(small, 10);
    assert_eq!(alloc.free_blocks(32), 0);
    assert_eq!(alloc.pages_held(), 2);
    alloc.release(medium, 200);
    assert_eq!(alloc.pages_held(), 0);
}

#[test]
fn test_buddy_siblings_merge_in_either_order() {
    for reverse in [false, true] {
        let mut alloc = BuddyAllocator::new(provider()).unwrap();
        let anchor = alloc.allocate(64).unwrap();
        let left = alloc.allocate(64).unwrap();
        let right = alloc.allocate(64).unwrap();

        let (page, left_off) = alloc.locate(left).unwrap();
        let (_, right_off) = alloc.locate(right).unwrap();
        let layout = alloc.layout();
        let pair = layout.index_of(left_off, 128);
        assert_eq!(right_off, left_off + 64);
        assert_eq!(left_off % 128, 0);
        assert_eq!(alloc.longest_free(page, pair), Some(0));

        let order = if reverse { [right, left] } else { [left, right] };
        alloc.release(order[0], 64);
        assert_eq!(alloc.longest_free(page, pair), Some(64));
        alloc.release(order[1], 64);
        assert_eq!(alloc.longest_free(page, pair), Some(128));

        alloc.release(anchor, 64);
        assert_eq!(alloc.pages_held(), 0);
        assert_eq!(alloc.provider().outstanding(), 0);
    }
}

#[test]
fn test_buddy_page_returned_when_root_is_full() {
    let mut alloc = BuddyAllocator::new(provider()).unwrap();
    let usable = alloc.layout().usable();
    let ptrs: Vec<_> = (0..8).map(|_| alloc.allocate(512).unwrap()).collect();
    let page = alloc.locate(ptrs[0]).unwrap().0;
    assert_eq!(alloc.pages_held(), 1);

    for ptr in &ptrs[1..] {
        alloc.release(*ptr, 512);
    }
    assert!(alloc.longest_free(page, 0).unwrap() < usable as u16);
    alloc.release(ptrs[0], 512);
    assert_eq!(alloc.longest_free(page, 0), None);
    assert_eq!(alloc.pages_held(), 0);
}

#[test]
fn test_boundary_tag_three_way_coalescing() {
    let mut alloc = BoundaryTagAllocator::new(provider()).unwrap();
    let a = alloc.allocate(200).unwrap();
    let b = alloc.allocate(200).unwrap();
    let c = alloc.allocate(200).unwrap();

    let page = alloc.locate(a).unwrap().0;
    assert_eq!(alloc.locate(c).unwrap().0, page);
    assert_eq!(b.addr() - a.addr(), 200 + boundary_tag::BLOCK_HEADER);
    assert_eq!(alloc.block_map().len(), 4);

    // neither neighbor free
    alloc.release(b, 200);
    let free: Vec<_> = alloc.block_map().iter().map(|i| i.free).collect();
    assert_eq!(free, vec![false, true, false, true]);

    // one neighbor free
    alloc.release(a, 200);
    let map = alloc.block_map();
    assert_eq!(map.len(), 3);
    assert!(map[0].free);
    assert_eq!(map[0].capacity, 200 + boundary_tag::BLOCK_HEADER + 200);

    // both neighbors free: the page collapses to one block and is returned
    alloc.release(c, 200);
    assert!(alloc.block_map().is_empty());
    assert_eq!(alloc.pages_held(), 0);
    assert_eq!(alloc.provider().released(), 1);
}

#[test]
fn test_boundary_tag_single_block_spans_page_before_retire() {
    let mut alloc = BoundaryTagAllocator::new(provider()).unwrap();
    let keep = alloc.allocate(PAGE_SIZE / 2).unwrap();
    let a = alloc.allocate(100).unwrap();
    let b = alloc.allocate(100).unwrap();
    let page = alloc.locate(keep).unwrap().0;

    alloc.release(a, 100);
    alloc.release(b, 100);
    let map = alloc.block_map();
    assert_eq!(map.len(), 2);
    assert!(map.iter().all(|i| i.page == page));
    assert!(map[1].free);

    alloc.release(keep, PAGE_SIZE / 2);
    assert_eq!(alloc.pages_held(), 0);
}

#[test]
fn test_boundary_tag_first_fit_reuses_earlier_hole() {
    let mut alloc = BoundaryTagAllocator::new(provider()).unwrap();
    let a = alloc.allocate(256).unwrap();
    let b = alloc.allocate(256).unwrap();
    alloc.release(a, 256);

    let c = alloc.allocate(128).unwrap();
    assert_eq!(c, a);
    let map = alloc.block_map();
    assert!(!map[0].free);
    assert!(map[1].free);
    assert_eq!(map[1].offset, map[0].offset + boundary_tag::BLOCK_HEADER + 128);

    alloc.release(b, 256);
    alloc.release(c, 128);
    assert_eq!(alloc.pages_held(), 0);
}
