//! Allocator identity

use core::fmt;
use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Process-unique identifier of an allocator instance
///
/// Allocators that stamp their blocks (free list, affix) compare stamps
/// against their own id. Unlike an instance address, the id survives moves
/// of the allocator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocatorId(NonZeroUsize);

impl AllocatorId {
    /// Generates a new unique id
    #[must_use]
    pub fn new() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(1);

        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        // Only reachable after usize::MAX registrations.
        Self(NonZeroUsize::new(id).unwrap_or(NonZeroUsize::MIN))
    }

    /// Raw value, as written into envelopes
    #[inline]
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for AllocatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AllocatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alloc#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = AllocatorId::new();
        let b = AllocatorId::new();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn test_option_is_niche_optimized() {
        assert_eq!(
            core::mem::size_of::<Option<AllocatorId>>(),
            core::mem::size_of::<usize>()
        );
    }
}
