/*!
 * Allocator Contract Tests
 * Properties every strategy must satisfy
 */

use crate::harness::{build, Tracker, PAGE_SIZE};
use kma::{AllocError, Allocator, StrategyKind};
use pretty_assertions::assert_eq;

#[test]
fn test_oversized_request_rejected_without_side_effects() {
    for kind in StrategyKind::ALL {
        let mut alloc = build(kind, PAGE_SIZE);
        let before = alloc.stats();

        let result = alloc.allocate(PAGE_SIZE + 1);
        assert!(
            matches!(&result, Err(AllocError::TooLarge { requested, .. }) if *requested == PAGE_SIZE + 1),
            "{kind}: {result:?}"
        );
        assert_eq!(alloc.stats(), before);
        assert_eq!(alloc.provider().obtained(), 0, "{kind}");
    }
}

#[test]
fn test_max_request_is_exact_boundary() {
    for kind in StrategyKind::ALL {
        let mut alloc = build(kind, PAGE_SIZE);
        let max = alloc.max_request();

        assert!(alloc.allocate(max + 1).is_err(), "{kind}");
        assert_eq!(alloc.pages_held(), 0, "{kind}");

        let mut tracker = Tracker::new();
        assert!(tracker.allocate(&mut alloc, max).is_some(), "{kind}");
        tracker.release_all(&mut alloc);
        assert_eq!(alloc.pages_held(), 0, "{kind}");
    }
}

#[test]
fn test_zero_size_rejected() {
    for kind in StrategyKind::ALL {
        let mut alloc = build(kind, PAGE_SIZE);
        assert_eq!(alloc.allocate(0), Err(AllocError::ZeroSize), "{kind}");
        assert_eq!(alloc.pages_held(), 0);
    }
}

#[test]
fn test_live_ranges_never_overlap() {
    for kind in StrategyKind::ALL {
        let mut alloc = build(kind, PAGE_SIZE);
        let mut tracker = Tracker::new();
        for size in [1, 7, 16, 31, 32, 33, 100, 500, 1000, 2000, 4000, 6000, 8000] {
            for _ in 0..4 {
                tracker.allocate(&mut alloc, size);
            }
        }
        assert_eq!(tracker.len(), 13 * 4, "{kind}");
        assert_eq!(alloc.stats().live_allocations, 13 * 4);
        tracker.release_all(&mut alloc);
    }
}

#[test]
fn test_quiescence_returns_every_page() {
    for kind in StrategyKind::ALL {
        let mut alloc = build(kind, PAGE_SIZE);
        let mut tracker = Tracker::new();
        for i in 1..300 {
            tracker.allocate(&mut alloc, (i * 37) % 3000 + 1);
        }
        assert!(alloc.pages_held() > 1, "{kind}");

        // release every other allocation, then the rest
        let addrs = tracker.addresses();
        for addr in addrs.iter().step_by(2) {
            tracker.release(&mut alloc, *addr);
        }
        tracker.release_all(&mut alloc);

        assert_eq!(alloc.pages_held(), 0, "{kind}");
        assert_eq!(alloc.stats().live_allocations, 0, "{kind}");
        let provider = alloc.provider();
        assert_eq!(provider.outstanding(), 0, "{kind}");
        assert_eq!(provider.obtained(), provider.released(), "{kind}");
    }
}

#[test]
fn test_round_trip_restores_accounting() {
    for kind in StrategyKind::ALL {
        let mut alloc = build(kind, PAGE_SIZE);
        let mut tracker = Tracker::new();
        for size in [40, 300, 64, 900] {
            tracker.allocate(&mut alloc, size);
        }

        for size in [1, 24, 64, 200, 1500, 5000, 7000] {
            let before = alloc.stats();
            let ptr = alloc.allocate(size).unwrap();
            alloc.release(ptr, size);
            assert_eq!(alloc.stats(), before, "{kind} size {size}");
        }
        tracker.release_all(&mut alloc);
        assert_eq!(alloc.pages_held(), 0, "{kind}");
    }
}

#[test]
fn test_allocator_reusable_after_quiescence() {
    for kind in StrategyKind::ALL {
        let mut alloc = build(kind, PAGE_SIZE);
        for round in 0..3 {
            let mut tracker = Tracker::new();
            for size in [10, 20, 30] {
                tracker.allocate(&mut alloc, size * (round + 1));
            }
            tracker.release_all(&mut alloc);
            assert_eq!(alloc.pages_held(), 0, "{kind} round {round}");
        }
    }
}
