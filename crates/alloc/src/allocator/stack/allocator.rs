//! Main stack allocator implementation
//!
//! # Safety
//!
//! - The arena owns one region of exactly `N` bytes aligned to
//!   [`DEFAULT_ALIGNMENT`]; it is freed in `Drop`
//! - Issued blocks point into that region, so moving the allocator value
//!   does not invalidate them
//!
//! ## Invariants
//!
//! - `0 <= cursor <= N`
//! - `cursor` is always a multiple of [`DEFAULT_ALIGNMENT`]
//! - Every footprint is `round_to_aligned(size, max(align, DEFAULT_ALIGNMENT))`
//! - A block is reclaimed only if it ends exactly at the cursor

use core::alloc::Layout;
use core::fmt;
use core::ptr::{self, NonNull};

use tracing::{debug, trace, warn};

use super::StackConfig;
use crate::core::{Allocator, Block};
use crate::error::{AllocError, AllocResult};
use crate::platform::DEFAULT_ALIGNMENT;
use crate::utils::{checked_round_to_aligned, round_to_default};

/// Bump allocator over a fixed `N`-byte region
///
/// Allocation advances a cursor. Deallocation only gives space back when the
/// block is the most recent one still outstanding; any other block stays
/// leaked until [`deallocate_all`](Self::deallocate_all).
///
/// # Memory Layout
/// ```text
/// [base]----[alloc1]----[alloc2]----[alloc3]----[cursor]----[free]----[base + N]
///            <------------ allocated ------------>          <-- remaining -->
/// ```
///
/// Deallocations reclaim in reverse order: alloc3, then alloc2, then alloc1.
/// Freeing every block in strict reverse order returns the cursor to the
/// base as long as every request used at most [`DEFAULT_ALIGNMENT`].
///
/// Requests aligned above [`DEFAULT_ALIGNMENT`] pad the cursor first, and
/// that padding is not recorded. Reclaiming such a block moves the cursor
/// back to the block's start, not to where it stood before the padding, so
/// the padding stays used until [`deallocate_all`](Self::deallocate_all).
/// The block itself is only reclaimed individually when its size rounds
/// identically at both alignments.
pub struct StackAllocator<const N: usize> {
    /// Start of the owned region
    base: NonNull<u8>,

    /// Offset of the next free byte
    cursor: usize,

    /// Configuration
    config: StackConfig,
}

// SAFETY: the allocator exclusively owns its region and holds no thread-local
// state; moving it to another thread moves that ownership.
unsafe impl<const N: usize> Send for StackAllocator<N> {}

impl<const N: usize> StackAllocator<N> {
    /// Layout of the backing region
    fn region_layout() -> AllocResult<Layout> {
        Layout::from_size_align(N, DEFAULT_ALIGNMENT)
            .map_err(|_| AllocError::invalid_config("arena capacity exceeds isize::MAX"))
    }

    /// Creates a new stack allocator with custom configuration
    pub fn with_config(config: StackConfig) -> AllocResult<Self> {
        let layout = Self::region_layout()?;

        let base = if N == 0 {
            // A zero-capacity arena never hands out memory; any aligned,
            // non-null address works as its base.
            NonNull::<u8>::dangling()
                .with_addr(core::num::NonZeroUsize::new(DEFAULT_ALIGNMENT).ok_or(AllocError::Fail)?)
        } else {
            // SAFETY: layout has non-zero size.
            let ptr = unsafe { std::alloc::alloc(layout) };
            NonNull::new(ptr).ok_or_else(|| AllocError::not_enough_memory(N))?
        };

        if let Some(pattern) = config.alloc_pattern {
            // SAFETY: region is N bytes, freshly allocated.
            unsafe { ptr::write_bytes(base.as_ptr(), pattern, N) };
        }

        debug!(capacity = N, "stack allocator created");

        Ok(Self {
            base,
            cursor: 0,
            config,
        })
    }

    /// Creates a new stack allocator with default configuration
    pub fn new() -> AllocResult<Self> {
        Self::with_config(StackConfig::default())
    }

    /// Creates a production-optimized stack allocator
    pub fn production() -> AllocResult<Self> {
        Self::with_config(StackConfig::production())
    }

    /// Creates a debug-optimized stack allocator
    pub fn debug() -> AllocResult<Self> {
        Self::with_config(StackConfig::debug())
    }

    /// Total capacity in bytes
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes between the base and the cursor, padding and leaks included
    #[inline]
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Bytes left before the arena is exhausted
    #[inline]
    pub fn remaining(&self) -> usize {
        N - self.cursor
    }

    /// Returns the configuration
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    #[inline]
    fn base_addr(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// Resets the cursor to the base, releasing every issued block at once
    ///
    /// Blocks issued before the reset must not be used afterwards; the arena
    /// cannot detect such use.
    pub fn deallocate_all(&mut self) {
        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: [base, base + cursor) lies inside the region.
            unsafe { ptr::write_bytes(self.base.as_ptr(), pattern, self.cursor) };
        }
        trace!(released = self.cursor, "stack allocator reset");
        self.cursor = 0;
    }
}

unsafe impl<const N: usize> Allocator for StackAllocator<N> {
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        let align = align.max(DEFAULT_ALIGNMENT);
        let base = self.base_addr();

        let span = checked_round_to_aligned(base + self.cursor, align).and_then(|top| {
            let start = top - base;
            let footprint = checked_round_to_aligned(size, align)?;
            Some((start, start.checked_add(footprint)?))
        });
        let (start, end) = match span {
            // A block must start inside the region for `owns` to claim it.
            Some((start, end)) if end <= N && start < N => (start, end),
            _ => {
                trace!(size, align, remaining = self.remaining(), "stack allocator exhausted");
                return Block::EMPTY;
            }
        };

        // SAFETY: start <= end <= N, so the pointer stays inside the region.
        let ptr = unsafe { self.base.add(start) };
        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: [start, start + size) is inside the region and unissued.
            unsafe { ptr::write_bytes(ptr.as_ptr(), pattern, size) };
        }

        self.cursor = end;
        Block::new(ptr, size)
    }

    unsafe fn deallocate(&mut self, block: &mut Block) {
        let block = block.take();
        if block.is_empty() {
            return;
        }
        if !self.owns(&block) {
            warn!(addr = block.addr(), "stack allocator ignored a block it does not own");
            return;
        }

        let offset = block.addr() - self.base_addr();
        if offset + round_to_default(block.size()) != self.cursor {
            trace!(offset, size = block.size(), "not on top of the stack, leaked until reset");
            return;
        }

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: [offset, cursor) lies inside the region and is being
            // given back.
            unsafe { ptr::write_bytes(block.as_ptr(), pattern, self.cursor - offset) };
        }
        self.cursor = offset;
    }

    #[inline]
    fn owns(&self, block: &Block) -> bool {
        let addr = block.addr();
        !block.is_empty() && addr >= self.base_addr() && addr < self.base_addr() + N
    }
}

impl<const N: usize> Drop for StackAllocator<N> {
    fn drop(&mut self) {
        if N == 0 {
            return;
        }
        if let Ok(layout) = Self::region_layout() {
            // SAFETY: `base` was allocated with exactly this layout in
            // `with_config` and is released only here.
            unsafe { std::alloc::dealloc(self.base.as_ptr(), layout) };
        }
        debug!(capacity = N, "stack allocator released");
    }
}

impl<const N: usize> fmt::Debug for StackAllocator<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackAllocator")
            .field("capacity", &N)
            .field("used", &self.cursor)
            .field("config", &self.config)
            .finish()
    }
}
