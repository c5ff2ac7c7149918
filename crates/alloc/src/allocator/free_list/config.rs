//! Free-list allocator configuration

use core::ops::RangeInclusive;

use crate::error::{AllocError, AllocResult};
use crate::platform::WORD_SIZE;

/// Block size and tolerance window of a [`FreeListAllocator`](super::FreeListAllocator)
///
/// Requests whose size lies in `min..=max` are served with a whole
/// `block_size` region, recycled when possible. All other requests bypass the
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeListConfig {
    /// Size of every recycled region
    pub block_size: usize,

    /// Smallest request served from the list
    pub min: usize,

    /// Largest request served from the list
    pub max: usize,
}

impl FreeListConfig {
    /// Window `min..=max` over regions of `block_size` bytes
    pub const fn new(block_size: usize, min: usize, max: usize) -> Self {
        Self {
            block_size,
            min,
            max,
        }
    }

    /// Only requests of exactly `block_size` bytes are recycled
    pub const fn exact(block_size: usize) -> Self {
        Self::new(block_size, block_size, block_size)
    }

    /// Whole window up to `block_size`
    pub const fn up_to(block_size: usize) -> Self {
        Self::new(block_size, 0, block_size)
    }

    /// The tolerance window as a range
    pub fn window(&self) -> RangeInclusive<usize> {
        self.min..=self.max
    }

    /// Whether a request of `size` bytes is served from the list
    #[inline]
    pub fn in_window(&self, size: usize) -> bool {
        self.min <= size && size <= self.max
    }

    /// Checks `WORD_SIZE <= block_size` and `min <= max <= block_size`
    pub fn validate(&self) -> AllocResult<()> {
        if self.block_size < WORD_SIZE {
            return Err(AllocError::invalid_config(format!(
                "free-list block size {} cannot hold a {WORD_SIZE}-byte link",
                self.block_size
            )));
        }
        if self.min > self.max {
            return Err(AllocError::invalid_config(format!(
                "free-list window is inverted: min {} > max {}",
                self.min, self.max
            )));
        }
        if self.max > self.block_size {
            return Err(AllocError::invalid_config(format!(
                "free-list window max {} exceeds block size {}",
                self.max, self.block_size
            )));
        }
        Ok(())
    }
}
