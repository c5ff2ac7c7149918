//! Pool allocator configuration

use crate::error::{AllocError, AllocResult};
use crate::platform::{DEFAULT_ALIGNMENT, WORD_SIZE};
use crate::utils::checked_round_to_aligned;

/// Configuration for [`PoolAllocator`](super::PoolAllocator)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Bytes per element; every slot holds at least this much
    pub element_size: usize,

    /// Number of slots in the backing region
    pub capacity: usize,

    /// Byte written over a slot when it is returned to the pool
    pub dealloc_pattern: Option<u8>,
}

impl PoolConfig {
    /// Production configuration - no fill pattern
    pub fn production(element_size: usize, capacity: usize) -> Self {
        Self {
            element_size,
            capacity,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - freed slots are filled with `0xDD`
    pub fn debug(element_size: usize, capacity: usize) -> Self {
        Self {
            element_size,
            capacity,
            dealloc_pattern: Some(0xDD),
        }
    }

    /// Picks [`debug`](Self::debug) under `debug_assertions`, otherwise
    /// [`production`](Self::production)
    pub fn new(element_size: usize, capacity: usize) -> Self {
        if cfg!(debug_assertions) {
            Self::debug(element_size, capacity)
        } else {
            Self::production(element_size, capacity)
        }
    }

    /// Distance between consecutive slots: `element_size` rounded to
    /// [`DEFAULT_ALIGNMENT`], never below one word so a free slot can hold
    /// its link
    pub fn stride(&self) -> AllocResult<usize> {
        checked_round_to_aligned(self.element_size.max(WORD_SIZE), DEFAULT_ALIGNMENT)
            .ok_or_else(|| AllocError::size_overflow("pool slot stride"))
    }

    /// Bytes the pool requests from its upstream allocator
    pub fn region_size(&self) -> AllocResult<usize> {
        self.stride()?
            .checked_mul(self.capacity)
            .ok_or_else(|| AllocError::size_overflow("pool region size"))
    }

    /// Checks that the geometry describes a usable pool
    pub fn validate(&self) -> AllocResult<()> {
        if self.element_size == 0 {
            return Err(AllocError::invalid_config("pool element size must be non-zero"));
        }
        if self.capacity == 0 {
            return Err(AllocError::invalid_config("pool capacity must be non-zero"));
        }
        self.region_size().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_holds_a_link() {
        let config = PoolConfig::production(1, 4);
        assert!(config.stride().unwrap() >= WORD_SIZE);
        assert_eq!(config.stride().unwrap(), DEFAULT_ALIGNMENT);
        assert_eq!(config.region_size().unwrap(), 4 * DEFAULT_ALIGNMENT);
    }

    #[test]
    fn test_stride_rounds_to_default_alignment() {
        for element_size in [8, 24, 40, DEFAULT_ALIGNMENT + 1] {
            let stride = PoolConfig::production(element_size, 1).stride().unwrap();
            assert!(stride >= element_size);
            assert_eq!(stride % DEFAULT_ALIGNMENT, 0);
            assert!(stride < element_size.max(WORD_SIZE) + DEFAULT_ALIGNMENT);
        }
    }

    #[test]
    fn test_validation() {
        assert!(PoolConfig::production(32, 8).validate().is_ok());
        assert!(matches!(
            PoolConfig::production(0, 8).validate(),
            Err(AllocError::InvalidConfig { .. })
        ));
        assert!(matches!(
            PoolConfig::production(32, 0).validate(),
            Err(AllocError::InvalidConfig { .. })
        ));
        assert!(matches!(
            PoolConfig::production(usize::MAX / 2, 4).validate(),
            Err(AllocError::SizeOverflow { .. })
        ));
    }

    #[test]
    fn test_presets() {
        assert_eq!(PoolConfig::debug(16, 2).dealloc_pattern, Some(0xDD));
        assert_eq!(PoolConfig::production(16, 2).dealloc_pattern, None);
    }
}
