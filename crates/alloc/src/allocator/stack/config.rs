//! Stack allocator configuration

/// Configuration for [`StackAllocator`](super::StackAllocator)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackConfig {
    /// Byte written over every newly issued block
    pub alloc_pattern: Option<u8>,

    /// Byte written over reclaimed space
    pub dealloc_pattern: Option<u8>,
}

impl Default for StackConfig {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::debug()
        } else {
            Self::production()
        }
    }
}

impl StackConfig {
    /// Production configuration - no fill patterns
    pub fn production() -> Self {
        Self {
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - uninitialized reads and use-after-reclaim show up
    /// as `0xCC` / `0xDD`
    pub fn debug() -> Self {
        Self {
            alloc_pattern: Some(0xCC),
            dealloc_pattern: Some(0xDD),
        }
    }
}
