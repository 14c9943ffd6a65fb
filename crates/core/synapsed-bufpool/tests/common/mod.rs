//! Common test utilities and helpers.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Range;
use synapsed_bufpool::{BufferPool, PoolConfig};

/// Request sizes used throughout the scenarios
pub const SCENARIO_SIZES: [usize; 7] = [31, 60, 63, 121, 250, 501, 1001];

/// Initialize test logging
pub fn init_test_logging() {
    synapsed_bufpool::logging::init_test_logging();
}

/// Pool with the reference geometry (1024 byte pages, 32 byte blocks)
pub fn reference_pool() -> BufferPool {
    BufferPool::new(1024, 32).expect("reference geometry is valid")
}

/// Pool built from an explicit configuration
pub fn pool_with(config: PoolConfig) -> BufferPool {
    BufferPool::with_config(config).expect("test configuration is valid")
}

/// Round `n` up to a multiple of `block`
pub fn round_up(n: usize, block: usize) -> usize {
    n.div_ceil(block) * block
}

/// Arena model: replays fresh allocations and returns `(arena_len, resizes)`.
pub fn model_arena_growth(page: usize, initial_pages: usize, segments: &[usize]) -> (usize, u64) {
    let mut length = page * initial_pages;
    let mut cursor = 0;
    let mut resizes = 0;
    for &segment in segments {
        let available = length - cursor;
        if segment > available {
            length += (segment - available).div_ceil(page) * page;
            resizes += 1;
        }
        cursor += segment;
    }
    (length, resizes)
}

/// Tracks byte ranges currently issued to callers and fails on any overlap.
#[derive(Debug, Default)]
pub struct IssuedRanges {
    ranges: Mutex<BTreeMap<usize, usize>>,
}

impl IssuedRanges {
    /// Record a newly issued range; panics if it overlaps a live one
    pub fn issue(&self, range: Range<usize>) {
        let mut ranges = self.ranges.lock();
        if let Some((&start, &end)) = ranges.range(..range.end).next_back() {
            assert!(
                end <= range.start || start >= range.end,
                "issued range {range:?} overlaps live range {start}..{end}"
            );
        }
        ranges.insert(range.start, range.end);
    }

    /// Forget a range that is about to be released
    pub fn retire(&self, range: &Range<usize>) {
        let removed = self.ranges.lock().remove(&range.start);
        assert_eq!(removed, Some(range.end), "retired range {range:?} was not live");
    }

    /// Number of live ranges
    pub fn live(&self) -> usize {
        self.ranges.lock().len()
    }
}
