//! The buffer pool: free-list reuse first, arena bump allocation second.
//!
//! ```rust
//! use synapsed_bufpool::BufferPool;
//!
//! let pool = BufferPool::new(1024, 32)?;
//! let mut buffer = pool.get_buffer(60)?;
//! pool.write(&mut buffer, 0, b"hello")?;
//! assert_eq!(&pool.read(&buffer)?[..5], b"hello");
//! pool.release_buffer(buffer)?;
//!
//! // Same size again: served from the free list, no new segment.
//! let again = pool.get_buffer(60)?;
//! assert_eq!(pool.metrics_snapshot().created, 1);
//! # pool.release_buffer(again)?;
//! # Ok::<(), synapsed_bufpool::BufferPoolError>(())
//! ```

use crate::arena::BackingArena;
use crate::config::PoolConfig;
use crate::error::{BufferPoolError, Result};
use crate::free_list::{FreeListRegistry, Segment};
use crate::metrics::{MetricsSnapshot, PoolMetrics};
use crate::size_class::SizeClassifier;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A caller's window `(offset, len)` into the pool's arena.
///
/// Views are move-only and borrow the pool they came from, so a view cannot
/// outlive its pool and cannot be used after it has been handed back to
/// [`BufferPool::release_buffer`].
pub struct BufferView<'pool> {
    pool_id: u64,
    offset: usize,
    len: usize,
    _pool: PhantomData<&'pool BufferPool>,
}

impl BufferView<'_> {
    /// Offset of the first byte inside the arena
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length requested by the caller
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; the pool never issues empty views
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Arena byte range covered by this view
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    /// Whether two views share any byte
    #[must_use]
    pub fn overlaps(&self, other: &BufferView<'_>) -> bool {
        self.pool_id == other.pool_id
            && self.offset < other.offset + other.len
            && other.offset < self.offset + self.len
    }
}

impl fmt::Debug for BufferView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("pool", &self.pool_id)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

/// Fixed-arena buffer pool with size-classed free lists
#[derive(Debug)]
pub struct BufferPool {
    id: u64,
    config: PoolConfig,
    classifier: SizeClassifier,
    arena: BackingArena,
    free_lists: FreeListRegistry,
    metrics: PoolMetrics,
}

impl BufferPool {
    /// Create a pool with the given page and block size.
    ///
    /// Fails with [`BufferPoolError::Configuration`] when `block_size` is not a
    /// power of two or `page_size` is not a multiple of it.
    pub fn new(page_size: usize, block_size: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(page_size, block_size))
    }

    /// Create a pool from a full configuration
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let classifier = SizeClassifier::new(config.block_size)?;
        let arena = BackingArena::new(config.page_size, config.initial_pages, config.max_arena_bytes)?;
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);

        debug!(
            pool = id,
            page_size = config.page_size,
            block_size = config.block_size,
            arena_bytes = arena.len(),
            "Created buffer pool"
        );

        Ok(Self {
            id,
            config,
            classifier,
            arena,
            free_lists: FreeListRegistry::new(),
            metrics: PoolMetrics::default(),
        })
    }

    /// Effective configuration
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Segment size a request of `requested` bytes is served from
    pub fn segment_size(&self, requested: usize) -> Result<usize> {
        self.classifier.segment_size(requested)
    }

    /// Free lists backing this pool
    #[must_use]
    pub fn free_lists(&self) -> &FreeListRegistry {
        &self.free_lists
    }

    /// Hand out a view of exactly `requested` bytes.
    ///
    /// A released segment of the same size class is reused when one is
    /// queued; otherwise a fresh segment is carved from the arena.
    pub fn get_buffer(&self, requested: usize) -> Result<BufferView<'_>> {
        let segment_size = self.classifier.segment_size(requested).map_err(|e| {
            self.metrics.record_rejected();
            warn!(pool = self.id, requested, error = %e, "Rejected buffer request");
            e
        })?;

        let offset = match self.free_lists.try_take(segment_size) {
            Some(segment) => {
                if segment.len == requested {
                    trace!(pool = self.id, offset = segment.offset, segment_size, "Reused buffer");
                } else {
                    self.metrics.record_recreated();
                    trace!(
                        pool = self.id,
                        offset = segment.offset,
                        segment_size,
                        requested,
                        "Re-created buffer over free segment"
                    );
                }
                segment.offset
            }
            None => {
                let reservation = self.arena.reserve(segment_size).map_err(|e| {
                    self.metrics.record_rejected();
                    warn!(pool = self.id, requested, segment_size, error = %e, "Arena exhausted");
                    e
                })?;
                if reservation.grew() {
                    self.metrics.record_resize(self.arena.len());
                }
                self.metrics.record_created();
                trace!(pool = self.id, offset = reservation.offset, segment_size, "Created buffer");
                reservation.offset
            }
        };

        self.metrics.record_requested();
        Ok(BufferView {
            pool_id: self.id,
            offset,
            len: requested,
            _pool: PhantomData,
        })
    }

    /// Take a view back, zero its bytes and queue its segment for reuse.
    ///
    /// Only the view's own width is cleared; bytes between the view's end and
    /// the segment boundary keep whatever a previous, wider holder wrote.
    pub fn release_buffer(&self, view: BufferView<'_>) -> Result<()> {
        self.check_owner(&view)?;
        let segment_size = self.classifier.segment_size(view.len)?;

        let segment = Segment {
            offset: view.offset,
            len: segment_size,
        };
        self.free_lists.give(segment, || {
            // SAFETY: `view` was moved in, so no caller can still reach these
            // bytes, and no other issued view overlaps them.
            unsafe { self.arena.zero(view.offset, view.len) }
        })?;

        self.metrics.record_released();
        trace!(pool = self.id, offset = view.offset, segment_size, "Released buffer");
        Ok(())
    }

    /// Copy the view's bytes out
    pub fn read(&self, view: &BufferView<'_>) -> Result<Vec<u8>> {
        self.with_bytes(view, <[u8]>::to_vec)
    }

    /// Run `f` over the view's bytes.
    ///
    /// `f` must not call back into this pool; the arena is read-locked for
    /// the duration of the call and growth would deadlock.
    pub fn with_bytes<R>(&self, view: &BufferView<'_>, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        self.check_owner(view)?;
        // SAFETY: writes require `&mut BufferView`, which cannot coexist with
        // this shared borrow, and issued views never overlap.
        unsafe { self.arena.with_range(view.offset, view.len, f) }
    }

    /// Run `f` over the view's bytes with write access.
    ///
    /// Same re-entrancy restriction as [`BufferPool::with_bytes`].
    pub fn with_bytes_mut<R>(
        &self,
        view: &mut BufferView<'_>,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R> {
        self.check_owner(view)?;
        // SAFETY: `&mut BufferView` is the only handle to this range and
        // issued views never overlap.
        unsafe { self.arena.with_range_mut(view.offset, view.len, f) }
    }

    /// Copy `data` into the view starting at `at`
    pub fn write(&self, view: &mut BufferView<'_>, at: usize, data: &[u8]) -> Result<()> {
        let end = at.checked_add(data.len()).filter(|&end| end <= view.len).ok_or_else(|| {
            BufferPoolError::invalid_argument(format!(
                "write of {} bytes at {at} overruns a {} byte buffer",
                data.len(),
                view.len
            ))
        })?;
        self.with_bytes_mut(view, |bytes| bytes[at..end].copy_from_slice(data))
    }

    /// Point-in-time metrics; does not change pool state
    #[must_use]
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let counters = self.metrics.counters();
        MetricsSnapshot {
            page_size: self.config.page_size,
            block_size: self.config.block_size,
            free_list_count: self.free_lists.free_list_count(),
            queued_buffers: self.free_lists.queued_total(),
            arena_bytes: self.arena.len(),
            arena_cursor: self.arena.cursor(),
            resizes: counters.resizes,
            created: counters.created,
            recreated: counters.recreated,
            requested: counters.requested,
            released: counters.released,
            rejected: counters.rejected,
            reuse_rate: MetricsSnapshot::compute_reuse_rate(
                counters.requested,
                counters.created,
                counters.recreated,
            ),
        }
    }

    fn check_owner(&self, view: &BufferView<'_>) -> Result<()> {
        if view.pool_id == self.id {
            return Ok(());
        }
        self.metrics.record_rejected();
        warn!(pool = self.id, owner = view.pool_id, offset = view.offset, "Foreign buffer view");
        Err(BufferPoolError::invalid_buffer(format!(
            "view at offset {} was issued by pool {}, not pool {}",
            view.offset, view.pool_id, self.id
        )))
    }
}
