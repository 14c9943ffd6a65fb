//! Pool counters and the read-only metrics snapshot.
//!
//! Counters are plain atomics bumped with `fetch_add`. With the `metrics`
//! feature enabled every bump is mirrored to the global `metrics` recorder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "metrics")]
mod names {
    pub const CREATED: &str = "synapsed_bufpool_created_total";
    pub const RECREATED: &str = "synapsed_bufpool_recreated_total";
    pub const REQUESTED: &str = "synapsed_bufpool_requested_total";
    pub const RELEASED: &str = "synapsed_bufpool_released_total";
    pub const RESIZES: &str = "synapsed_bufpool_resizes_total";
    pub const REJECTED: &str = "synapsed_bufpool_rejected_total";
    pub const ARENA_BYTES: &str = "synapsed_bufpool_arena_bytes";
}

macro_rules! bump {
    ($counter:expr, $name:ident) => {{
        $counter.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        ::metrics::counter!(names::$name).increment(1);
    }};
}

/// Live counters shared by every caller of a pool
#[derive(Debug, Default)]
pub struct PoolMetrics {
    created: AtomicU64,
    recreated: AtomicU64,
    requested: AtomicU64,
    released: AtomicU64,
    resizes: AtomicU64,
    rejected: AtomicU64,
}

impl PoolMetrics {
    /// A segment was freshly carved from the arena
    pub fn record_created(&self) {
        bump!(self.created, CREATED);
    }

    /// A free segment was reissued under a narrower window
    pub fn record_recreated(&self) {
        bump!(self.recreated, RECREATED);
    }

    /// A buffer was handed out
    pub fn record_requested(&self) {
        bump!(self.requested, REQUESTED);
    }

    /// A buffer came back
    pub fn record_released(&self) {
        bump!(self.released, RELEASED);
    }

    /// The arena grew to `arena_bytes`
    pub fn record_resize(&self, arena_bytes: usize) {
        bump!(self.resizes, RESIZES);
        #[cfg(feature = "metrics")]
        ::metrics::gauge!(names::ARENA_BYTES).set(arena_bytes as f64);
        #[cfg(not(feature = "metrics"))]
        let _ = arena_bytes;
    }

    /// A call failed and left the pool untouched
    pub fn record_rejected(&self) {
        bump!(self.rejected, REJECTED);
    }

    pub(crate) fn counters(&self) -> Counters {
        // Independent loads; under traffic the set can be slightly torn.
        Counters {
            requested: self.requested.load(Ordering::Acquire),
            created: self.created.load(Ordering::Acquire),
            recreated: self.recreated.load(Ordering::Acquire),
            released: self.released.load(Ordering::Acquire),
            resizes: self.resizes.load(Ordering::Acquire),
            rejected: self.rejected.load(Ordering::Acquire),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Counters {
    pub requested: u64,
    pub created: u64,
    pub recreated: u64,
    pub released: u64,
    pub resizes: u64,
    pub rejected: u64,
}

/// Point-in-time view of a pool's geometry and counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Arena growth granularity in bytes
    pub page_size: usize,
    /// Segment alignment in bytes
    pub block_size: usize,
    /// Number of segment sizes with at least one queued buffer
    pub free_list_count: usize,
    /// Total buffers waiting in free lists
    pub queued_buffers: usize,
    /// Current arena length in bytes
    pub arena_bytes: usize,
    /// Bytes carved out of the arena so far
    pub arena_cursor: usize,
    /// Number of arena growth events
    pub resizes: u64,
    /// Buffers carved fresh from the arena
    pub created: u64,
    /// Free segments reissued under a different width
    pub recreated: u64,
    /// Buffers handed out
    pub requested: u64,
    /// Buffers returned
    pub released: u64,
    /// Calls that failed without touching pool state
    pub rejected: u64,
    /// Fraction of requests served by a pure reuse (0.0 to 1.0)
    pub reuse_rate: f64,
}

impl MetricsSnapshot {
    /// Reuse rate as `(requested - created - recreated) / requested`,
    /// 0 when nothing has been requested
    #[must_use]
    pub fn compute_reuse_rate(requested: u64, created: u64, recreated: u64) -> f64 {
        if requested == 0 {
            return 0.0;
        }
        let reused = requested.saturating_sub(created.saturating_add(recreated));
        (reused as f64 / requested as f64).clamp(0.0, 1.0)
    }

    /// Number of requests served without carving or re-windowing a segment
    #[must_use]
    pub fn pure_reuses(&self) -> u64 {
        self.requested
            .saturating_sub(self.created.saturating_add(self.recreated))
    }

    /// Buffers currently issued to callers
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        self.requested.saturating_sub(self.released)
    }

    /// Serialize the snapshot as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Buffer pool metrics")?;
        writeln!(f, "  page size:       {}", self.page_size)?;
        writeln!(f, "  block size:      {}", self.block_size)?;
        writeln!(f, "  free lists:      {}", self.free_list_count)?;
        writeln!(f, "  queued buffers:  {}", self.queued_buffers)?;
        writeln!(f, "  arena bytes:     {}", self.arena_bytes)?;
        writeln!(f, "  arena cursor:    {}", self.arena_cursor)?;
        writeln!(f, "  resizes:         {}", self.resizes)?;
        writeln!(f, "  created:         {}", self.created)?;
        writeln!(f, "  re-created:      {}", self.recreated)?;
        writeln!(f, "  requested:       {}", self.requested)?;
        writeln!(f, "  released:        {}", self.released)?;
        writeln!(f, "  rejected:        {}", self.rejected)?;
        write!(f, "  reuse rate:      {:.2}%", self.reuse_rate * 100.0)
    }
}
