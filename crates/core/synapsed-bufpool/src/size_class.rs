//! Size classing for buffer requests.
//!
//! Every request is rounded up to a *segment size*: the smallest multiple of
//! the pool's block size that can hold it. Free lists and the arena cursor
//! only ever deal in segment sizes.

use crate::error::{BufferPoolError, Result};

/// Maps requested byte counts to block-aligned segment sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClassifier {
    block_size: usize,
    mask: usize,
}

impl SizeClassifier {
    /// Create a classifier for the given block size.
    ///
    /// `block_size` must be a non-zero power of two.
    pub fn new(block_size: usize) -> Result<Self> {
        if !block_size.is_power_of_two() {
            return Err(BufferPoolError::config("blockSize must be a power of 2"));
        }

        Ok(Self {
            block_size,
            mask: !(block_size - 1),
        })
    }

    /// Block size this classifier rounds to
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Segment size for a request of `requested` bytes.
    ///
    /// Zero-length requests are rejected rather than rounded, as are requests
    /// so large that rounding up would overflow.
    pub fn segment_size(&self, requested: usize) -> Result<usize> {
        if requested == 0 {
            return Err(BufferPoolError::invalid_argument(
                "requested size must be greater than zero",
            ));
        }

        requested
            .checked_add(self.block_size - 1)
            .map(|padded| padded & self.mask)
            .ok_or_else(|| {
                BufferPoolError::invalid_argument(format!(
                    "requested size {requested} cannot be rounded to a {} byte block",
                    self.block_size
                ))
            })
    }

    /// Whether `size` is already a segment size
    #[must_use]
    pub fn is_aligned(&self, size: usize) -> bool {
        size != 0 && size & !self.mask == 0
    }
}
