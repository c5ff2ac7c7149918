//! Main pool allocator implementation
//!
//! # Safety
//!
//! - The backing region is one block obtained from the upstream allocator at
//!   construction and returned to it in `Drop`
//! - Free slots store the next pointer in their first word (intrusive list)
//!
//! ## Invariants
//!
//! - Every slot starts at `region + k * stride` for some `k < capacity`
//! - `stride` is a non-zero multiple of [`DEFAULT_ALIGNMENT`], so every slot
//!   honors the default alignment
//! - Slots in `[0, carved)` are either issued or on the free list, never both
//! - `carved + stride <= region_size` is required before carving a new slot

use core::fmt;
use core::mem;
use core::ptr::{self, NonNull};

use tracing::{debug, trace, warn};

use super::PoolConfig;
use crate::core::{Allocator, Block};
use crate::error::{AllocError, AllocResult};
use crate::platform::DEFAULT_ALIGNMENT;

/// Node in the free list
///
/// When a slot is free, its first word holds a pointer to the next free slot.
/// A slot must not be read as live data between deallocation and reissue.
#[repr(C)]
struct FreeSlot {
    next: Option<NonNull<FreeSlot>>,
}

/// Fixed-slot allocator backed by a single upstream region
///
/// Every allocation gets one whole slot aligned to [`DEFAULT_ALIGNMENT`].
/// Requests larger than a slot, or aligned more strictly than the default,
/// fail with an empty block instead of handing out undersized storage.
///
/// # Memory Layout
/// ```text
/// [slot0][slot1][slot2][slot3]......[slotN-1]
///  <------ carved ------>  <--- untouched --->
///
/// free_head -> slot1 -> slot0 -> None
/// ```
///
/// Freed slots are reused last-in first-out before fresh slots are carved.
pub struct PoolAllocator<A: Allocator> {
    /// Source of the backing region
    upstream: A,

    /// Backing region, `capacity * stride` bytes
    region: Block,

    /// Distance between consecutive slots
    stride: usize,

    /// Bytes of the region handed out at least once
    carved: usize,

    /// Head of the free list
    free_head: Option<NonNull<FreeSlot>>,

    /// Length of the free list
    free_count: usize,

    /// Configuration
    config: PoolConfig,
}

// SAFETY: the pool exclusively owns its region; slot pointers never escape
// except through issued blocks, which the caller owns.
unsafe impl<A: Allocator + Send> Send for PoolAllocator<A> {}

impl<A: Allocator> PoolAllocator<A> {
    /// Creates a pool with custom configuration
    ///
    /// # Errors
    /// - [`AllocError::InvalidConfig`] / [`AllocError::SizeOverflow`] if the
    ///   geometry is unusable
    /// - [`AllocError::NotEnoughMemory`] if upstream cannot supply the region
    pub fn with_config(mut upstream: A, config: PoolConfig) -> AllocResult<Self> {
        config.validate()?;
        let stride = config.stride()?;
        let region_size = config.region_size()?;

        let region = upstream.allocate(region_size, DEFAULT_ALIGNMENT);
        if region.is_empty() {
            return Err(AllocError::not_enough_memory(region_size));
        }

        debug!(
            element_size = config.element_size,
            capacity = config.capacity,
            stride,
            "pool allocator created"
        );

        Ok(Self {
            upstream,
            region,
            stride,
            carved: 0,
            free_head: None,
            free_count: 0,
            config,
        })
    }

    /// Creates a pool of `capacity` slots of `element_size` bytes each
    pub fn new(upstream: A, element_size: usize, capacity: usize) -> AllocResult<Self> {
        Self::with_config(upstream, PoolConfig::new(element_size, capacity))
    }

    /// Creates a pool sized for values of type `T`
    ///
    /// Fails with [`AllocError::InvalidAlignment`] if `T` is aligned more
    /// strictly than the platform default.
    pub fn for_type<T>(upstream: A, capacity: usize) -> AllocResult<Self> {
        if mem::align_of::<T>() > DEFAULT_ALIGNMENT {
            return Err(AllocError::invalid_alignment(mem::align_of::<T>()));
        }
        Self::new(upstream, mem::size_of::<T>().max(1), capacity)
    }

    /// Requested bytes per element
    pub fn element_size(&self) -> usize {
        self.config.element_size
    }

    /// Distance between consecutive slots
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Alignment guaranteed for every slot
    pub const fn slot_align(&self) -> usize {
        DEFAULT_ALIGNMENT
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Slots that can still be issued (recycled plus never carved)
    pub fn free_slots(&self) -> usize {
        self.free_count + (self.region.size() - self.carved) / self.stride
    }

    /// Returns the configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the upstream allocator
    pub fn upstream(&self) -> &A {
        &self.upstream
    }

    fn pop_free(&mut self) -> Option<NonNull<u8>> {
        let head = self.free_head?;
        // SAFETY: every node on the list is a slot of this region that was
        // written by `push_free` and not reissued since.
        self.free_head = unsafe { head.as_ptr().read().next };
        self.free_count -= 1;
        Some(head.cast())
    }

    fn push_free(&mut self, slot: NonNull<u8>) {
        let node = slot.cast::<FreeSlot>();
        // SAFETY: slot is a default-aligned, stride-sized slot of this region
        // that the caller just gave back.
        unsafe { node.as_ptr().write(FreeSlot { next: self.free_head }) };
        self.free_head = Some(node);
        self.free_count += 1;
    }

    fn carve(&mut self) -> Option<NonNull<u8>> {
        if self.carved + self.stride > self.region.size() {
            return None;
        }
        let base = self.region.as_non_null()?;
        // SAFETY: carved + stride <= region size.
        let slot = unsafe { base.add(self.carved) };
        self.carved += self.stride;
        Some(slot)
    }
}

unsafe impl<A: Allocator> Allocator for PoolAllocator<A> {
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        if size > self.stride || align > DEFAULT_ALIGNMENT {
            trace!(size, align, stride = self.stride, "request does not fit a pool slot");
            return Block::EMPTY;
        }

        match self.pop_free().or_else(|| self.carve()) {
            Some(slot) => Block::new(slot, size),
            None => {
                trace!(capacity = self.config.capacity, "pool exhausted");
                Block::EMPTY
            }
        }
    }

    unsafe fn deallocate(&mut self, block: &mut Block) {
        let block = block.take();
        let Some(slot) = block.as_non_null() else {
            return;
        };

        let offset = block.addr().wrapping_sub(self.region.addr());
        if !self.owns(&block) || offset % self.stride != 0 {
            warn!(addr = block.addr(), "pool ignored a block that is not one of its slots");
            return;
        }

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: the slot is `stride` bytes inside the region.
            unsafe { ptr::write_bytes(slot.as_ptr(), pattern, self.stride) };
        }
        self.push_free(slot);
    }

    #[inline]
    fn owns(&self, block: &Block) -> bool {
        !block.is_empty()
            && block.addr() >= self.region.addr()
            && block.addr() < self.region.addr() + self.carved
    }
}

impl<A: Allocator> Drop for PoolAllocator<A> {
    fn drop(&mut self) {
        // SAFETY: region was issued by `upstream` in `with_config` and is
        // released only here.
        unsafe { self.upstream.deallocate(&mut self.region) };
        debug!(capacity = self.config.capacity, "pool allocator released");
    }
}

impl<A: Allocator> fmt::Debug for PoolAllocator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("stride", &self.stride)
            .field("capacity", &self.config.capacity)
            .field("free_slots", &self.free_slots())
            .finish()
    }
}
