//! Reservation protocol of the growable pool, observed through a page-source probe.

mod common;

use blockpool::{Checked, PoolAllocator, PoolError};
use common::ProbeSource;
use pretty_assertions::assert_eq;
use rstest::rstest;

type Pool = PoolAllocator<u64, ProbeSource, Checked>;

fn probed_pool() -> (Pool, std::rc::Rc<common::Probe>) {
    let (source, probe) = ProbeSource::new();
    (Pool::with_source(source), probe)
}

#[rstest]
#[case::partial_top(2, 5)]
#[case::full_top(3, 4)]
#[case::fits_in_top(4, 2)]
#[case::large_batch(7, 100)]
#[case::single(1, 1)]
fn reserved_blocks_need_no_backing_allocation(#[case] prefill: usize, #[case] n: usize) {
    let (mut pool, probe) = probed_pool();
    let mut blocks: Vec<_> = (0..prefill).map(|_| pool.allocate(1).unwrap()).collect();

    pool.reserve(n).unwrap();
    let after_reserve = probe.allocations.get();

    for _ in 0..n {
        blocks.push(pool.allocate(1).unwrap());
    }
    assert_eq!(probe.allocations.get(), after_reserve);
    assert_eq!(pool.used_blocks(), prefill + n);
}

#[test]
fn reservation_bypasses_free_list() {
    let (mut pool, probe) = probed_pool();
    let blocks: Vec<_> = (0..3).map(|_| pool.allocate(1).unwrap()).collect();
    unsafe { pool.deallocate(blocks[0], 1).unwrap() };

    pool.reserve(4).unwrap();
    let after_reserve = probe.allocations.get();
    for _ in 0..4 {
        let block = pool.allocate(1).unwrap();
        assert_ne!(block, blocks[0]);
    }
    assert_eq!(probe.allocations.get(), after_reserve);
    assert_eq!(pool.free_list_len(), 1);
}

#[test]
fn ordinary_growth_ends_forced_page_writes() {
    let (mut pool, _probe) = probed_pool();
    let first = pool.allocate(1).unwrap();
    pool.reserve(1).unwrap();
    assert!(pool.is_forcing_page_writes());

    let _second = pool.allocate(1).unwrap(); // consumes the reserved page
    assert!(pool.is_forcing_page_writes());

    let _third = pool.allocate(1).unwrap(); // fresh page from the source
    assert!(!pool.is_forcing_page_writes());

    // Free list is preferred again
    unsafe { pool.deallocate(first, 1).unwrap() };
    assert_eq!(pool.allocate(1).unwrap(), first);
}

#[test]
fn reserve_before_first_allocation_is_rejected() {
    let (mut pool, probe) = probed_pool();
    assert_eq!(pool.reserve(3), Err(PoolError::NoActivePage));
    assert!(pool.is_empty());
    assert_eq!(probe.allocations.get(), 0);
}

#[test]
fn reserve_zero_changes_nothing() {
    let (mut pool, probe) = probed_pool();
    let _a = pool.allocate(1).unwrap();
    pool.reserve(0).unwrap();
    assert!(!pool.is_forcing_page_writes());
    assert_eq!(probe.allocations.get(), 1);
}

#[test]
fn emptied_top_page_discards_reserved_page() {
    let (mut pool, probe) = probed_pool();
    let _a = pool.allocate(1).unwrap();
    let b = pool.allocate(1).unwrap(); // second page, one block left

    pool.reserve(5).unwrap();
    assert!(pool.has_reserved_page());
    assert_eq!(probe.live_pages(), 3);

    // b is the only block of the top page: the page and the reservation go
    unsafe { pool.deallocate(b, 1).unwrap() };
    assert!(!pool.has_reserved_page());
    assert_eq!(probe.live_pages(), 1);
    assert_eq!(pool.allocated_blocks(), 1);

    // The reservation has to be requested again
    let before = probe.allocations.get();
    let _c = pool.allocate(1).unwrap();
    assert_eq!(probe.allocations.get(), before + 1);
}

#[test]
fn failed_growth_leaves_pool_unchanged() {
    let (source, _probe) = ProbeSource::with_budget(1);
    let mut pool = Pool::with_source(source);
    let a = pool.allocate(1).unwrap();

    let err = pool.allocate(1).unwrap_err();
    assert!(matches!(err, PoolError::AllocationFailed { .. }));
    assert!(!err.is_contract_violation());
    assert_eq!(pool.used_blocks(), 1);
    assert_eq!(pool.page_count(), 1);
    assert_eq!(pool.allocated_blocks(), 1);

    assert!(pool.reserve(4).is_err());
    assert!(!pool.has_reserved_page());
    assert!(!pool.is_forcing_page_writes());

    // The pool still works for what it already holds
    unsafe { pool.deallocate(a, 1).unwrap() };
    assert!(pool.is_empty());
}

#[test]
fn failed_rebuild_keeps_existing_reservation() {
    let (source, probe) = ProbeSource::with_budget(3);
    let mut pool = Pool::with_source(source);
    let _blocks: Vec<_> = (0..2).map(|_| pool.allocate(1).unwrap()).collect();

    pool.reserve(3).unwrap(); // top has one block left, reserved page holds two
    assert_eq!(pool.stats().reserved_blocks, 2);
    assert_eq!(pool.allocated_blocks(), 5);

    let err = pool.reserve(10).unwrap_err();
    assert!(matches!(err, PoolError::AllocationFailed { .. }));
    assert!(pool.has_reserved_page());
    assert_eq!(pool.stats().reserved_blocks, 2);
    assert_eq!(pool.allocated_blocks(), 5);
    assert_eq!(probe.live_pages(), 3);

    // The earlier reservation still covers three allocations
    for _ in 0..3 {
        pool.allocate(1).unwrap();
    }
    assert_eq!(probe.allocations.get(), 3);
    assert!(pool.allocate(1).is_err());
}

#[test]
fn drop_releases_every_page() {
    let (mut pool, probe) = probed_pool();
    for _ in 0..20 {
        pool.allocate(1).unwrap();
    }
    pool.reserve(64).unwrap();
    assert!(probe.live_bytes.get() > 0);

    drop(pool);
    assert_eq!(probe.live_pages(), 0);
    assert_eq!(probe.live_bytes.get(), 0);
}
