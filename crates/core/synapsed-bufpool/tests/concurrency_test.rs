//! Multi-threaded behaviour: no two issued views alias, counters never lose
//! updates, and growth under contention keeps issued bytes intact.

mod common;

use common::{init_test_logging, reference_pool, IssuedRanges, SCENARIO_SIZES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Barrier;
use synapsed_bufpool::{BufferPool, BufferView};

const THREADS: usize = 8;
const OPERATIONS: usize = 2_000;

fn churn(pool: &BufferPool, issued: &IssuedRanges, seed: u64) -> (u64, u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let tag = (seed % 251 + 1) as u8;
    let mut held: Vec<BufferView<'_>> = Vec::new();
    let (mut gets, mut releases) = (0, 0);

    for _ in 0..OPERATIONS {
        if !held.is_empty() && (held.len() > 12 || rng.gen_bool(0.45)) {
            let view = held.swap_remove(rng.gen_range(0..held.len()));
            let intact = pool
                .with_bytes(&view, |bytes| bytes.iter().all(|&b| b == tag))
                .unwrap();
            assert!(intact, "buffer at offset {} was written by another thread", view.offset());
            issued.retire(&view.range());
            pool.release_buffer(view).unwrap();
            releases += 1;
        } else {
            let size = SCENARIO_SIZES[rng.gen_range(0..SCENARIO_SIZES.len())];
            let mut view = pool.get_buffer(size).unwrap();
            assert_eq!(view.len(), size);
            issued.issue(view.range());
            pool.with_bytes_mut(&mut view, |bytes| bytes.fill(tag)).unwrap();
            held.push(view);
            gets += 1;
        }
    }

    for view in held {
        issued.retire(&view.range());
        pool.release_buffer(view).unwrap();
        releases += 1;
    }
    (gets, releases)
}

#[test]
fn test_issued_views_never_overlap() {
    init_test_logging();
    let pool = reference_pool();
    let issued = IssuedRanges::default();
    let barrier = Barrier::new(THREADS);

    let totals: Vec<(u64, u64)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS as u64)
            .map(|seed| {
                let (pool, issued, barrier) = (&pool, &issued, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    churn(pool, issued, seed)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let gets: u64 = totals.iter().map(|(g, _)| g).sum();
    let releases: u64 = totals.iter().map(|(_, r)| r).sum();

    let snapshot = pool.metrics_snapshot();
    assert_eq!(issued.live(), 0);
    assert_eq!(snapshot.requested, gets, "Concurrent requests must not lose counts");
    assert_eq!(snapshot.released, releases);
    assert_eq!(snapshot.requested, snapshot.released);
    assert!(snapshot.reuse_rate >= 0.0 && snapshot.reuse_rate <= 1.0);
    assert_eq!(snapshot.arena_bytes % 1024, 0);
    assert!(snapshot.arena_cursor <= snapshot.arena_bytes);
}

#[test]
fn test_presence_matches_queues_after_contention() {
    let pool = reference_pool();
    let issued = IssuedRanges::default();

    std::thread::scope(|scope| {
        for seed in 100..104 {
            let (pool, issued) = (&pool, &issued);
            scope.spawn(move || churn(pool, issued, seed));
        }
    });

    let registry = pool.free_lists();
    for &size in &SCENARIO_SIZES {
        let segment = pool.segment_size(size).unwrap();
        assert_eq!(
            registry.is_present(segment),
            registry.queued(segment) > 0,
            "presence for {segment} drifted from its queue"
        );
    }
    assert_eq!(registry.free_list_count(), registry.present_sizes().len());
}

#[test]
fn test_concurrent_growth_keeps_bytes() {
    let pool = BufferPool::new(64, 32).unwrap();
    let barrier = Barrier::new(4);

    std::thread::scope(|scope| {
        for worker in 0..4u8 {
            let (pool, barrier) = (&pool, &barrier);
            scope.spawn(move || {
                barrier.wait();
                let mut views = Vec::new();
                for i in 0..50u8 {
                    let mut view = pool.get_buffer(64).unwrap();
                    pool.with_bytes_mut(&mut view, |b| b.fill(worker * 64 + i)).unwrap();
                    views.push((view, worker * 64 + i));
                }
                for (view, value) in &views {
                    let bytes = pool.read(view).unwrap();
                    assert!(bytes.iter().all(|b| b == value));
                }
            });
        }
    });

    let snapshot = pool.metrics_snapshot();
    assert_eq!(snapshot.created, 200);
    assert_eq!(snapshot.arena_cursor, 200 * 64);
    assert!(snapshot.resizes > 0);
}
