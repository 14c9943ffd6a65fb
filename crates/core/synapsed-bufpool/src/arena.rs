//! Growable backing arena with a monotonic bump cursor.
//!
//! The arena owns every byte the pool ever hands out. Segments are carved by
//! advancing a cursor; when the cursor would run past the end, the arena grows
//! in whole pages with a copying resize that preserves every byte range that
//! is already issued.
//!
//! Two locks are involved:
//!
//! - `state` (a `Mutex`) serialises cursor bumps and growth decisions.
//! - `storage` (a `RwLock`) guards the bytes themselves. Byte access through
//!   views takes it shared, growth takes it exclusive, so a resize can never
//!   move the storage out from under a reader or writer.

use crate::error::{BufferPoolError, Result};
use parking_lot::{Mutex, RwLock};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Outcome of carving one segment out of the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// Offset of the new segment
    pub offset: usize,
    /// Number of pages the arena grew by to satisfy this reservation
    pub pages_added: usize,
}

impl Reservation {
    /// Whether the arena had to grow
    #[must_use]
    pub fn grew(&self) -> bool {
        self.pages_added > 0
    }
}

#[derive(Debug)]
struct ArenaState {
    /// Next free byte offset
    cursor: usize,
    /// Current arena length in bytes
    length: usize,
}

/// Single growable byte region backing every buffer view
pub struct BackingArena {
    storage: RwLock<Vec<UnsafeCell<u8>>>,
    state: Mutex<ArenaState>,
    page_size: usize,
    max_bytes: Option<usize>,
    /// Lock-free mirror of `state.length` for reporting
    length: AtomicUsize,
}

impl BackingArena {
    /// Create an arena of `initial_pages` pages.
    ///
    /// `max_bytes` caps the arena length; growth beyond it fails with
    /// [`BufferPoolError::OutOfMemory`].
    pub fn new(page_size: usize, initial_pages: usize, max_bytes: Option<usize>) -> Result<Self> {
        if page_size == 0 {
            return Err(BufferPoolError::config("pageSize must be greater than zero"));
        }

        let initial_len = page_size.checked_mul(initial_pages).ok_or_else(|| {
            BufferPoolError::config(format!(
                "initial arena of {initial_pages} pages of {page_size} bytes overflows"
            ))
        })?;

        if let Some(max) = max_bytes {
            if initial_len > max {
                return Err(BufferPoolError::config(format!(
                    "initial arena of {initial_len} bytes exceeds the {max} byte limit"
                )));
            }
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(initial_len)
            .map_err(|_| BufferPoolError::OutOfMemory {
                requested: initial_len,
                current: 0,
            })?;
        bytes.resize_with(initial_len, || UnsafeCell::new(0));

        Ok(Self {
            storage: RwLock::new(bytes),
            state: Mutex::new(ArenaState {
                cursor: 0,
                length: initial_len,
            }),
            page_size,
            max_bytes,
            length: AtomicUsize::new(initial_len),
        })
    }

    /// Page size growth is measured in
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Current arena length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.length.load(Ordering::Acquire)
    }

    /// Whether the arena has no capacity at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes carved out so far
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    /// Carve a fresh segment of `segment_size` bytes, growing the arena by
    /// whole pages when the remaining tail is too short.
    ///
    /// On failure the cursor is left untouched.
    pub fn reserve(&self, segment_size: usize) -> Result<Reservation> {
        let mut state = self.state.lock();

        let available = state.length - state.cursor;
        let mut pages_added = 0;
        if segment_size > available {
            let overflow = segment_size - available;
            pages_added = overflow.div_ceil(self.page_size);
            let new_length = pages_added
                .checked_mul(self.page_size)
                .and_then(|additional| state.length.checked_add(additional))
                .ok_or(BufferPoolError::OutOfMemory {
                    requested: overflow,
                    current: state.length,
                })?;

            self.grow_to(state.length, new_length)?;
            state.length = new_length;
        }

        let offset = state.cursor;
        state.cursor += segment_size;

        Ok(Reservation {
            offset,
            pages_added,
        })
    }

    /// Resize the storage to `new_length`, keeping existing bytes in place.
    /// Caller holds the `state` lock.
    fn grow_to(&self, current: usize, new_length: usize) -> Result<()> {
        let requested = new_length - current;
        if let Some(max) = self.max_bytes {
            if new_length > max {
                return Err(BufferPoolError::OutOfMemory { requested, current });
            }
        }

        let mut storage = self.storage.write();
        storage
            .try_reserve_exact(requested)
            .map_err(|_| BufferPoolError::OutOfMemory { requested, current })?;
        storage.resize_with(new_length, || UnsafeCell::new(0));
        self.length.store(new_length, Ordering::Release);

        debug!(
            from = current,
            to = new_length,
            pages = requested / self.page_size,
            "Grew backing arena"
        );
        Ok(())
    }

    /// Run `f` over the bytes in `[offset, offset + len)`.
    ///
    /// # Safety
    ///
    /// No other thread may be writing to the same range for the duration of
    /// the call. The pool upholds this by handing out disjoint ranges and
    /// requiring `&mut` access to a view for writes.
    pub(crate) unsafe fn with_range<R>(
        &self,
        offset: usize,
        len: usize,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R> {
        let storage = self.storage.read();
        let cells = range_of(&storage, offset, len)?;
        // SAFETY: `UnsafeCell<u8>` has the same layout as `u8`; the caller
        // guarantees no concurrent writer for this range.
        let bytes = unsafe {
            std::slice::from_raw_parts(UnsafeCell::raw_get(cells.as_ptr()).cast_const(), len)
        };
        Ok(f(bytes))
    }

    /// Run `f` over the bytes in `[offset, offset + len)` with write access.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive access to the range: no other reader or
    /// writer may touch any byte of it for the duration of the call.
    pub(crate) unsafe fn with_range_mut<R>(
        &self,
        offset: usize,
        len: usize,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R> {
        let storage = self.storage.read();
        let cells = range_of(&storage, offset, len)?;
        // SAFETY: writes go through `UnsafeCell`, the shared lock keeps the
        // allocation alive and unmoved, and the caller guarantees exclusivity.
        let bytes =
            unsafe { std::slice::from_raw_parts_mut(UnsafeCell::raw_get(cells.as_ptr()), len) };
        Ok(f(bytes))
    }

    /// Zero-fill `[offset, offset + len)`.
    ///
    /// # Safety
    ///
    /// Same contract as [`BackingArena::with_range_mut`].
    pub(crate) unsafe fn zero(&self, offset: usize, len: usize) -> Result<()> {
        // SAFETY: forwarded to the caller.
        unsafe { self.with_range_mut(offset, len, |bytes| bytes.fill(0)) }
    }
}

fn range_of(storage: &[UnsafeCell<u8>], offset: usize, len: usize) -> Result<&[UnsafeCell<u8>]> {
    offset
        .checked_add(len)
        .and_then(|end| storage.get(offset..end))
        .ok_or_else(|| {
            BufferPoolError::invalid_buffer(format!(
                "range {offset}+{len} lies outside the {} byte arena",
                storage.len()
            ))
        })
}

impl std::fmt::Debug for BackingArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BackingArena")
            .field("length", &state.length)
            .field("cursor", &state.cursor)
            .field("page_size", &self.page_size)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

// SAFETY: all byte access is mediated by `storage`'s lock plus the disjointness
// contract on the unsafe accessors; the cells themselves are plain bytes.
unsafe impl Sync for BackingArena {}
