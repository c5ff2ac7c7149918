//! Main free-list allocator implementation
//!
//! # Safety
//!
//! - Recycled regions store the next pointer in their first word
//! - Every node on the list is exactly `block_size` bytes, was obtained from
//!   `upstream` by this instance, and is returned to it in `Drop`
//!
//! ## Invariants
//!
//! - A request in the tolerance window is backed by a `block_size` region
//! - A request outside the window is backed by an upstream block of its own
//!   size and goes back upstream on deallocation
//! - Deallocation either recycles or forwards, never both
//!
//! ## Ownership checks
//!
//! Debug builds keep a side table of the blocks this instance has issued,
//! keyed by address and size and counted, since an arena upstream can hand
//! out a zero-size block at the same address as the region that follows it.
//! Deallocating anything else is logged and ignored, and `owns` is exact.
//!
//! Release builds keep no table. `owns` then answers
//! `size == block_size || upstream.owns(block)`, which misclassifies an
//! unrelated block of coincidentally equal size. Deallocating a foreign block
//! whose size is in the window corrupts the list.

#[cfg(debug_assertions)]
use std::collections::HashMap;
#[cfg(debug_assertions)]
use std::collections::hash_map::Entry;

use core::fmt;
use core::ptr::NonNull;

use tracing::{debug, trace, warn};

use super::FreeListConfig;
use crate::core::{Allocator, AllocatorId, Block};
use crate::error::AllocResult;
use crate::platform::DEFAULT_ALIGNMENT;

/// Link stored in a recycled region
#[repr(C)]
struct FreeNode {
    next: Option<NonNull<FreeNode>>,
}

/// Size-window recycler in front of an upstream allocator
///
/// # Memory Layout
/// ```text
/// request in [min, max]:   upstream --block_size--> caller --free--> head -> node -> node
///                                                      ^                  |
///                                                      +----- reuse ------+
/// request outside window:  upstream <----------- own size -----------> caller
/// ```
pub struct FreeListAllocator<A: Allocator> {
    /// Source of fresh regions and of out-of-window blocks
    upstream: A,

    /// Block size and tolerance window
    config: FreeListConfig,

    /// Head of the recycle list
    head: Option<NonNull<FreeNode>>,

    /// Length of the recycle list
    recycled: usize,

    /// Identity reported in diagnostics
    id: AllocatorId,

    /// `(addr, size)` of blocks issued and not yet deallocated, with counts
    #[cfg(debug_assertions)]
    issued: HashMap<(usize, usize), usize>,
}

// SAFETY: list nodes are regions exclusively owned by this instance.
unsafe impl<A: Allocator + Send> Send for FreeListAllocator<A> {}

impl<A: Allocator> FreeListAllocator<A> {
    /// Creates a free list in front of `upstream`
    ///
    /// # Errors
    /// [`AllocError::InvalidConfig`](crate::AllocError::InvalidConfig) if the
    /// window does not satisfy `min <= max <= block_size` or the block cannot
    /// hold a link word.
    pub fn new(upstream: A, config: FreeListConfig) -> AllocResult<Self> {
        config.validate()?;
        let id = AllocatorId::new();
        debug!(
            %id,
            block_size = config.block_size,
            min = config.min,
            max = config.max,
            "free-list allocator created"
        );

        Ok(Self {
            upstream,
            config,
            head: None,
            recycled: 0,
            id,
            #[cfg(debug_assertions)]
            issued: HashMap::new(),
        })
    }

    /// Shorthand for `new(upstream, FreeListConfig::new(block_size, min, max))`
    pub fn with_window(upstream: A, block_size: usize, min: usize, max: usize) -> AllocResult<Self> {
        Self::new(upstream, FreeListConfig::new(block_size, min, max))
    }

    /// Number of regions waiting on the list
    pub fn recycled(&self) -> usize {
        self.recycled
    }

    /// Returns the configuration
    pub fn config(&self) -> &FreeListConfig {
        &self.config
    }

    /// Identity of this instance
    pub fn id(&self) -> AllocatorId {
        self.id
    }

    /// Returns the upstream allocator
    pub fn upstream(&self) -> &A {
        &self.upstream
    }

    fn pop(&mut self) -> Option<NonNull<u8>> {
        let node = self.head?;
        // SAFETY: nodes on the list were written by `push` and are not issued.
        self.head = unsafe { node.as_ptr().read().next };
        self.recycled -= 1;
        Some(node.cast())
    }

    fn push(&mut self, region: NonNull<u8>) {
        let node = region.cast::<FreeNode>();
        // SAFETY: region is a `block_size >= WORD_SIZE` byte, at least
        // word-aligned region obtained from upstream, now unused.
        unsafe { node.as_ptr().write(FreeNode { next: self.head }) };
        self.head = Some(node);
        self.recycled += 1;
    }

    #[inline]
    fn track(&mut self, block: &Block) {
        #[cfg(debug_assertions)]
        if !block.is_empty() {
            *self.issued.entry((block.addr(), block.size())).or_insert(0) += 1;
        }
        #[cfg(not(debug_assertions))]
        let _ = block;
    }

    /// Removes the block from the side table; `false` if it was never issued
    #[inline]
    fn untrack(&mut self, block: &Block) -> bool {
        #[cfg(debug_assertions)]
        {
            match self.issued.entry((block.addr(), block.size())) {
                Entry::Occupied(mut entry) => {
                    *entry.get_mut() -= 1;
                    if *entry.get() == 0 {
                        entry.remove();
                    }
                    true
                }
                Entry::Vacant(_) => false,
            }
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = block;
            true
        }
    }
}

unsafe impl<A: Allocator> Allocator for FreeListAllocator<A> {
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        if !self.config.in_window(size) {
            let block = self.upstream.allocate(size, align);
            self.track(&block);
            return block;
        }

        // Recycled regions only guarantee the default alignment.
        let recycled = if align <= DEFAULT_ALIGNMENT { self.pop() } else { None };
        let region = match recycled {
            Some(region) => region,
            None => {
                let fresh = self
                    .upstream
                    .allocate(self.config.block_size, align.max(DEFAULT_ALIGNMENT));
                match fresh.as_non_null() {
                    Some(region) => region,
                    None => {
                        trace!(id = %self.id, size, "upstream could not supply a fresh block");
                        return Block::EMPTY;
                    }
                }
            }
        };

        let block = Block::new(region, size);
        self.track(&block);
        block
    }

    unsafe fn deallocate(&mut self, block: &mut Block) {
        let mut block = block.take();
        let Some(region) = block.as_non_null() else {
            return;
        };

        if !self.untrack(&block) {
            warn!(id = %self.id, addr = block.addr(), "free list ignored a block it did not issue");
            return;
        }

        if self.config.in_window(block.size()) {
            self.push(region);
        } else {
            // SAFETY: out-of-window blocks were issued by upstream at their
            // own size.
            unsafe { self.upstream.deallocate(&mut block) };
        }
    }

    fn owns(&self, block: &Block) -> bool {
        if block.is_empty() {
            return false;
        }
        #[cfg(debug_assertions)]
        {
            self.issued.contains_key(&(block.addr(), block.size()))
        }
        #[cfg(not(debug_assertions))]
        {
            block.size() == self.config.block_size || self.upstream.owns(block)
        }
    }
}

impl<A: Allocator> Drop for FreeListAllocator<A> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        if !self.issued.is_empty() {
            let outstanding: usize = self.issued.values().sum();
            debug!(id = %self.id, outstanding, "free list dropped with live blocks");
        }

        let released = self.recycled;
        while let Some(region) = self.pop() {
            let mut block = Block::new(region, self.config.block_size);
            // SAFETY: every list node came from `upstream` as a `block_size`
            // region.
            unsafe { self.upstream.deallocate(&mut block) };
        }
        debug!(id = %self.id, released, "free-list allocator released");
    }
}

impl<A: Allocator> fmt::Debug for FreeListAllocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeListAllocator")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("recycled", &self.recycled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{AlignedHeapAllocator, HeapAllocator, StackAllocator};
    use crate::error::AllocError;

    fn heap_list(block_size: usize, min: usize, max: usize) -> FreeListAllocator<HeapAllocator> {
        FreeListAllocator::with_window(HeapAllocator::new(), block_size, min, max).unwrap()
    }

    #[test]
    fn test_in_window_block_is_recycled() {
        let mut list = heap_list(64, 32, 64);
        let mut block = list.allocate(40, 8);
        assert_eq!(block.size(), 40);
        let addr = block.addr();

        unsafe { list.deallocate(&mut block) };
        assert!(block.is_empty());
        assert_eq!(list.recycled(), 1);

        let again = list.allocate(64, 8);
        assert_eq!(again.addr(), addr);
        assert_eq!(again.size(), 64);
        assert_eq!(list.recycled(), 0);
    }

    #[test]
    fn test_out_of_window_goes_upstream() {
        let mut list = heap_list(64, 32, 64);
        let mut small = list.allocate(32, 8);
        unsafe { list.deallocate(&mut small) };
        assert_eq!(list.recycled(), 1);

        let mut big = list.allocate(128, 8);
        assert!(!big.is_empty());
        assert_eq!(list.recycled(), 1);

        unsafe { list.deallocate(&mut big) };
        assert_eq!(list.recycled(), 1);
    }

    #[test]
    fn test_fresh_regions_are_block_sized() {
        let mut list = FreeListAllocator::with_window(
            StackAllocator::<1024>::new().unwrap(),
            64,
            16,
            64,
        )
        .unwrap();

        let _a = list.allocate(16, 8);
        assert_eq!(list.upstream().used(), 64);
        let _b = list.allocate(200, 8);
        assert_eq!(list.upstream().used(), 64 + 208);
    }

    #[test]
    fn test_over_aligned_request_skips_list() {
        let mut list =
            FreeListAllocator::with_window(AlignedHeapAllocator::new(), 64, 0, 64).unwrap();
        let mut narrow = list.allocate(32, 8);
        unsafe { list.deallocate(&mut narrow) };
        assert_eq!(list.recycled(), 1);

        let mut wide = list.allocate(32, 256);
        assert!(!wide.is_empty());
        assert_eq!(wide.addr() % 256, 0);
        assert_eq!(list.recycled(), 1);

        unsafe { list.deallocate(&mut wide) };
        assert_eq!(list.recycled(), 2);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_foreign_block_is_ignored() {
        let mut list = heap_list(64, 0, 64);
        let mut other = heap_list(64, 0, 64);

        let mut mine = list.allocate(64, 8);
        let mut theirs = other.allocate(64, 8);
        assert!(list.owns(&mine));
        assert!(!list.owns(&theirs));

        let mut copy = theirs;
        unsafe { list.deallocate(&mut copy) };
        assert!(copy.is_empty());
        assert_eq!(list.recycled(), 0);

        unsafe {
            list.deallocate(&mut mine);
            other.deallocate(&mut theirs);
        }
        assert_eq!(list.recycled(), 1);
        assert_eq!(other.recycled(), 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_double_free_is_ignored() {
        let mut list = heap_list(64, 0, 64);
        let block = list.allocate(64, 8);
        let mut first = block;
        let mut second = block;
        unsafe {
            list.deallocate(&mut first);
            list.deallocate(&mut second);
        }
        assert_eq!(list.recycled(), 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_zero_size_block_shares_address_with_region() {
        let mut list = FreeListAllocator::with_window(
            StackAllocator::<256>::new().unwrap(),
            64,
            8,
            64,
        )
        .unwrap();

        let mut empty = list.allocate(0, 8);
        let mut region = list.allocate(64, 8);
        assert_eq!(empty.addr(), region.addr());
        assert!(list.owns(&empty));
        assert!(list.owns(&region));

        unsafe { list.deallocate(&mut empty) };
        assert!(list.owns(&region));

        unsafe { list.deallocate(&mut region) };
        assert_eq!(list.recycled(), 1);
        assert!(!list.owns(&Block::new(NonNull::dangling(), 64)));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_repeated_zero_size_blocks_are_counted() {
        let mut list = FreeListAllocator::with_window(
            StackAllocator::<128>::new().unwrap(),
            64,
            8,
            64,
        )
        .unwrap();

        let mut first = list.allocate(0, 8);
        let mut second = list.allocate(0, 8);
        let issued = second;
        assert_eq!(first, second);

        unsafe { list.deallocate(&mut first) };
        assert!(list.owns(&second));
        unsafe { list.deallocate(&mut second) };
        assert!(!list.owns(&issued));
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_release_owns_is_size_heuristic() {
        let mut list = FreeListAllocator::with_window(
            StackAllocator::<256>::new().unwrap(),
            64,
            8,
            64,
        )
        .unwrap();
        let mut issued = list.allocate(32, 8);

        let mut local = [0u64; 8];
        let base = local.as_mut_ptr().cast::<u8>();
        // Any block of exactly `block_size` bytes is claimed, foreign or not.
        assert!(list.owns(&Block::from_raw(base, 64)));
        // A smaller foreign block is claimed only if upstream claims it.
        assert!(!list.owns(&Block::from_raw(base, 32)));
        assert!(!list.upstream().owns(&Block::from_raw(base, 32)));
        // Issued smaller blocks are found through upstream.
        assert!(list.owns(&issued));

        unsafe { list.deallocate(&mut issued) };
        assert_eq!(list.recycled(), 1);
    }

    #[test]
    fn test_rejects_invalid_window() {
        assert!(matches!(
            FreeListAllocator::with_window(HeapAllocator::new(), 64, 65, 128),
            Err(AllocError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_distinct_ids() {
        let a = heap_list(32, 0, 32);
        let b = heap_list(32, 0, 32);
        assert_ne!(a.id(), b.id());
    }
}
