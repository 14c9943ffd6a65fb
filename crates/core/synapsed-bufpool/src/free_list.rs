//! Size-indexed free lists of released segments.
//!
//! Each segment size owns its own FIFO queue behind its own mutex, so traffic
//! on one size never waits on another. The presence set is a cached index of
//! the sizes whose queue is non-empty; it is only ever updated while holding
//! that size's queue lock, which keeps "present" and "non-empty" in lockstep.

use crate::error::Result;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A segment-aligned byte range inside the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Offset of the first byte
    pub offset: usize,
    /// Segment size in bytes
    pub len: usize,
}

type Queue = Arc<Mutex<VecDeque<Segment>>>;

/// Registry of free lists keyed by segment size
#[derive(Debug, Default)]
pub struct FreeListRegistry {
    lists: DashMap<usize, Queue>,
    present: DashSet<usize>,
}

impl FreeListRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, segment_size: usize) -> Option<Queue> {
        self.lists.get(&segment_size).map(|entry| Arc::clone(entry.value()))
    }

    fn queue_or_insert(&self, segment_size: usize) -> Queue {
        let entry = self.lists.entry(segment_size).or_default();
        Arc::clone(entry.value())
    }

    /// Dequeue the oldest released segment of `segment_size`, if any.
    ///
    /// The dequeue and the presence update happen in one critical section.
    pub fn try_take(&self, segment_size: usize) -> Option<Segment> {
        let queue = self.queue(segment_size)?;
        let mut queue = queue.lock();

        let taken = queue.pop_front();
        if queue.is_empty() {
            self.present.remove(&segment_size);
        }
        taken
    }

    /// Enqueue a released segment.
    ///
    /// `scrub` runs under the size's lock before the segment becomes visible
    /// to [`FreeListRegistry::try_take`]; if it fails the segment is not queued.
    pub fn give(&self, segment: Segment, scrub: impl FnOnce() -> Result<()>) -> Result<()> {
        let queue = self.queue_or_insert(segment.len);
        let mut queue = queue.lock();

        scrub()?;
        queue.push_back(segment);
        self.present.insert(segment.len);
        Ok(())
    }

    /// Whether at least one segment of `segment_size` is queued
    #[must_use]
    pub fn is_present(&self, segment_size: usize) -> bool {
        self.present.contains(&segment_size)
    }

    /// Segment sizes that currently have queued segments, ascending
    #[must_use]
    pub fn present_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.present.iter().map(|size| *size).collect();
        sizes.sort_unstable();
        sizes
    }

    /// Number of non-empty free lists
    #[must_use]
    pub fn free_list_count(&self) -> usize {
        self.present.len()
    }

    /// Queue depth for one segment size
    #[must_use]
    pub fn queued(&self, segment_size: usize) -> usize {
        self.queue(segment_size).map_or(0, |queue| queue.lock().len())
    }

    /// Total segments waiting across every size
    #[must_use]
    pub fn queued_total(&self) -> usize {
        let queues: Vec<Queue> = self.lists.iter().map(|entry| Arc::clone(entry.value())).collect();
        queues.iter().map(|queue| queue.lock().len()).sum()
    }
}
