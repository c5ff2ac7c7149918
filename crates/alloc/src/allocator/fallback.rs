//! Try one allocator, then another

use tracing::trace;

use crate::core::{Allocator, Block};

/// Serves each request from `A` if it can, otherwise from `B`
///
/// Deallocation asks `A` first whether it owns the block; only blocks `A`
/// rejects reach `B`. Put the allocator with the exact `owns` in the primary
/// position and a pass-through heap, which owns everything, last.
///
/// Chains nest: `FallbackAllocator<A, FallbackAllocator<B, C>>`.
#[derive(Debug, Default)]
pub struct FallbackAllocator<A, B> {
    primary: A,
    secondary: B,
}

impl<A: Allocator, B: Allocator> FallbackAllocator<A, B> {
    /// Composes `primary` in front of `secondary`
    pub const fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }

    /// The allocator tried first
    pub fn primary(&self) -> &A {
        &self.primary
    }

    /// The allocator tried when the primary fails
    pub fn secondary(&self) -> &B {
        &self.secondary
    }

    /// Mutable access to the primary allocator
    pub fn primary_mut(&mut self) -> &mut A {
        &mut self.primary
    }

    /// Mutable access to the secondary allocator
    pub fn secondary_mut(&mut self) -> &mut B {
        &mut self.secondary
    }

    /// Splits the composition back into its parts
    pub fn into_parts(self) -> (A, B) {
        (self.primary, self.secondary)
    }
}

unsafe impl<A: Allocator, B: Allocator> Allocator for FallbackAllocator<A, B> {
    #[inline]
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        let block = self.primary.allocate(size, align);
        if !block.is_empty() {
            return block;
        }
        trace!(size, align, "primary allocator failed, trying secondary");
        self.secondary.allocate(size, align)
    }

    #[inline]
    unsafe fn deallocate(&mut self, block: &mut Block) {
        if block.is_empty() {
            return;
        }
        // SAFETY: the block came from one of the two; `owns` picks which.
        unsafe {
            if self.primary.owns(block) {
                self.primary.deallocate(block);
            } else {
                self.secondary.deallocate(block);
            }
        }
        *block = Block::EMPTY;
    }

    #[inline]
    fn owns(&self, block: &Block) -> bool {
        self.primary.owns(block) || self.secondary.owns(block)
    }
}
