//! Pass-through heap allocators
//!
//! Both allocators here delegate straight to the C runtime and claim
//! ownership of every block, which makes them the natural last link of a
//! [`FallbackAllocator`](super::FallbackAllocator) chain.

use tracing::trace;

use crate::core::{Allocator, Block};
use crate::platform::{DEFAULT_ALIGNMENT, WORD_SIZE};

/// `malloc` / `free`
///
/// The C runtime only guarantees [`DEFAULT_ALIGNMENT`]; requests for a
/// stricter alignment return an empty block. Use [`AlignedHeapAllocator`]
/// for over-aligned data.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl HeapAllocator {
    /// Creates a new heap allocator
    ///
    /// This is a zero-cost operation as the allocator contains no state.
    #[inline]
    pub const fn new() -> Self {
        HeapAllocator
    }
}

unsafe impl Allocator for HeapAllocator {
    #[inline]
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        if align > DEFAULT_ALIGNMENT {
            trace!(size, align, "heap cannot honor alignment above the malloc guarantee");
            return Block::EMPTY;
        }

        // `malloc(0)` may legitimately return null; ask for one byte so a
        // zero-sized request still yields a distinct, freeable pointer.
        // SAFETY: plain FFI call, no preconditions.
        let ptr = unsafe { libc::malloc(size.max(1)) }.cast::<u8>();
        let block = Block::from_raw(ptr, size);
        if block.is_empty() {
            trace!(size, "malloc failed");
        }
        block
    }

    #[inline]
    unsafe fn deallocate(&mut self, block: &mut Block) {
        let block = block.take();
        if block.is_empty() {
            return;
        }
        // SAFETY: caller guarantees the block came from `allocate`, i.e. from
        // `malloc`, and has not been freed.
        unsafe { libc::free(block.as_ptr().cast()) };
    }

    #[inline]
    fn owns(&self, _block: &Block) -> bool {
        true
    }
}

/// Alignment-aware variant: `posix_memalign` on unix, `_aligned_malloc` on
/// Windows
#[derive(Debug, Clone, Copy, Default)]
pub struct AlignedHeapAllocator;

impl AlignedHeapAllocator {
    /// Creates a new aligned heap allocator
    #[inline]
    pub const fn new() -> Self {
        AlignedHeapAllocator
    }

    /// Describes the underlying platform primitive
    pub fn info() -> &'static str {
        if cfg!(unix) {
            "posix_memalign / free"
        } else if cfg!(windows) {
            "_aligned_malloc / _aligned_free"
        } else {
            "unsupported"
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        unsafe fn aligned_alloc_raw(size: usize, align: usize) -> *mut u8 {
            // posix_memalign wants a power of two that is also a multiple of
            // the pointer size.
            let align = align.max(WORD_SIZE);
            let mut out: *mut libc::c_void = core::ptr::null_mut();
            // SAFETY: `out` is a valid place to write the result; `align`
            // satisfies the posix_memalign requirements.
            let rc = unsafe { libc::posix_memalign(&mut out, align, size) };
            if rc == 0 { out.cast() } else { core::ptr::null_mut() }
        }

        unsafe fn aligned_free_raw(ptr: *mut u8) {
            // SAFETY: `ptr` came from posix_memalign.
            unsafe { libc::free(ptr.cast()) }
        }
    } else if #[cfg(windows)] {
        unsafe fn aligned_alloc_raw(size: usize, align: usize) -> *mut u8 {
            let align = align.max(WORD_SIZE);
            // SAFETY: plain FFI call; `align` is a power of two.
            unsafe { libc::aligned_malloc(size, align) }.cast()
        }

        unsafe fn aligned_free_raw(ptr: *mut u8) {
            // SAFETY: `ptr` came from _aligned_malloc.
            unsafe { libc::aligned_free(ptr.cast()) }
        }
    } else {
        compile_error!("AlignedHeapAllocator requires a unix or windows target");
    }
}

unsafe impl Allocator for AlignedHeapAllocator {
    #[inline]
    fn allocate(&mut self, size: usize, align: usize) -> Block {
        // SAFETY: `align` is a power of two per the allocator contract.
        let ptr = unsafe { aligned_alloc_raw(size.max(1), align) };
        let block = Block::from_raw(ptr, size);
        if block.is_empty() {
            trace!(size, align, "aligned heap allocation failed");
        }
        block
    }

    #[inline]
    unsafe fn deallocate(&mut self, block: &mut Block) {
        let block = block.take();
        if block.is_empty() {
            return;
        }
        // SAFETY: caller guarantees the block came from `allocate`.
        unsafe { aligned_free_raw(block.as_ptr()) };
    }

    #[inline]
    fn owns(&self, _block: &Block) -> bool {
        true
    }
}

/// The heap allocator best suited to the current platform
pub type PlatformHeap = AlignedHeapAllocator;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_aligned;

    #[test]
    fn test_basic_allocation() {
        let mut heap = HeapAllocator::new();
        let mut block = heap.allocate(64, 8);
        assert!(!block.is_empty());
        assert_eq!(block.size(), 64);
        assert!(is_aligned(block.addr(), 8));

        unsafe {
            block.as_mut_slice().fill(0x5A);
            assert_eq!(*block.as_ptr().add(63), 0x5A);
            heap.deallocate(&mut block);
        }
        assert!(block.is_empty());
    }

    #[test]
    fn test_zero_sized_allocation() {
        let mut heap = HeapAllocator::new();
        let mut block = heap.allocate(0, 1);
        assert!(!block.is_empty());
        assert_eq!(block.size(), 0);
        unsafe { heap.deallocate(&mut block) };
    }

    #[test]
    fn test_over_aligned_request_rejected() {
        let mut heap = HeapAllocator::new();
        assert!(heap.allocate(32, DEFAULT_ALIGNMENT * 2).is_empty());
    }

    #[test]
    fn test_owns_everything() {
        let heap = HeapAllocator::new();
        let mut local = 0u8;
        assert!(heap.owns(&Block::from_raw(&mut local, 1)));
        assert!(heap.owns(&Block::EMPTY));
        assert!(AlignedHeapAllocator::new().owns(&Block::EMPTY));
    }

    #[test]
    fn test_deallocate_empty_is_noop() {
        let mut block = Block::EMPTY;
        unsafe {
            HeapAllocator::new().deallocate(&mut block);
            AlignedHeapAllocator::new().deallocate(&mut block);
        }
        assert!(block.is_empty());
    }

    #[test]
    fn test_aligned_allocation() {
        let mut heap = AlignedHeapAllocator::new();
        for shift in 0..13 {
            let align = 1usize << shift;
            let mut block = heap.allocate(24, align);
            assert!(!block.is_empty(), "align {align}");
            assert!(is_aligned(block.addr(), align), "align {align}");
            unsafe { heap.deallocate(&mut block) };
        }
    }

    #[test]
    fn test_info_names_primitive() {
        assert_ne!(AlignedHeapAllocator::info(), "unsupported");
    }
}
