//! The allocator capability contract
//!
//! Every strategy in this crate, terminal or composed, implements
//! [`Allocator`]. Composition wrappers are written only against this trait and
//! are resolved by generic instantiation, so nesting costs no dynamic
//! dispatch.
//!
//! # Safety
//!
//! `Allocator` is an `unsafe trait`: implementors promise that every
//! non-empty [`Block`] they return
//! - is valid for reads and writes of `block.size()` bytes,
//! - is aligned to the requested alignment,
//! - does not overlap any other block the same instance has issued and not
//!   yet taken back.
//!
//! Composition wrappers inherit these guarantees from the allocators they
//! wrap and must not weaken them.

use super::Block;
use crate::platform::DEFAULT_ALIGNMENT;

/// Allocate / deallocate / owns over [`Block`]s
///
/// # Failure
/// Allocation never panics on exhaustion: it returns [`Block::EMPTY`]. It
/// never returns a partial block.
///
/// # Safety
/// See the module documentation for the guarantees implementors uphold.
pub unsafe trait Allocator {
    /// Allocates `size` bytes aligned to `align`
    ///
    /// `align` must be a power of two; this is not validated. On success the
    /// returned block's size equals `size`, whatever the strategy's internal
    /// footprint. On failure the block is empty.
    fn allocate(&mut self, size: usize, align: usize) -> Block;

    /// Releases `block` and resets the caller's handle to [`Block::EMPTY`]
    ///
    /// Passing an empty block is always a no-op.
    ///
    /// # Safety
    /// `block` must be empty or have been issued by this allocator and not
    /// released since. Strategies that detect foreign blocks (free list in
    /// debug builds, affix) ignore them instead, but callers must not rely on
    /// that for terminal strategies: a foreign block corrupts a pool or arena
    /// and is undefined behavior for the heap.
    unsafe fn deallocate(&mut self, block: &mut Block);

    /// Whether `block` was issued by this allocator
    ///
    /// Side-effect free. Pass-through allocators answer `true` for every
    /// block so they can terminate a fallback chain.
    fn owns(&self, block: &Block) -> bool;

    /// Allocates `size` bytes with [`DEFAULT_ALIGNMENT`]
    #[inline]
    fn allocate_default(&mut self, size: usize) -> Block {
        self.allocate(size, DEFAULT_ALIGNMENT)
    }
}

// Forwarding through `&mut A` lets callers lend an allocator to the object
// layer or to a wrapper without giving it up.
unsafe impl<A: Allocator + ?Sized> Allocator for &mut A {
    #[inline]
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        (**self).allocate(size, align)
    }

    #[inline]
    unsafe fn deallocate(&mut self, block: &mut Block) {
        // SAFETY: forwarded with the caller's guarantees.
        unsafe { (**self).deallocate(block) }
    }

    #[inline]
    fn owns(&self, block: &Block) -> bool {
        (**self).owns(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr::NonNull;

    /// Hands out one static slot, once
    struct OneShot {
        slot: [u64; 2],
        taken: bool,
    }

    unsafe impl Allocator for OneShot {
        fn allocate(&mut self, size: usize, _align: usize) -> Block {
            if self.taken || size > core::mem::size_of_val(&self.slot) {
                return Block::EMPTY;
            }
            self.taken = true;
            Block::new(NonNull::from(&mut self.slot).cast(), size)
        }

        unsafe fn deallocate(&mut self, block: &mut Block) {
            if block.take().is_empty() {
                return;
            }
            self.taken = false;
        }

        fn owns(&self, block: &Block) -> bool {
            block.addr() == self.slot.as_ptr() as usize
        }
    }

    fn use_twice<A: Allocator>(mut alloc: A) -> (Block, Block) {
        let first = alloc.allocate_default(8);
        let second = alloc.allocate_default(8);
        (first, second)
    }

    #[test]
    fn test_exhaustion_is_empty_block() {
        let mut alloc = OneShot {
            slot: [0; 2],
            taken: false,
        };
        let (first, second) = use_twice(&mut alloc);
        assert!(!first.is_empty());
        assert!(second.is_empty());
        assert!(alloc.owns(&first));
        assert!(!alloc.owns(&second));
    }

    #[test]
    fn test_deallocate_through_reference_resets_handle() {
        let mut alloc = OneShot {
            slot: [0; 2],
            taken: false,
        };
        let mut block = alloc.allocate(16, 8);
        assert_eq!(block.size(), 16);

        let mut by_ref = &mut alloc;
        unsafe { Allocator::deallocate(&mut by_ref, &mut block) };
        assert!(block.is_empty());
        assert!(!alloc.taken);
    }
}
