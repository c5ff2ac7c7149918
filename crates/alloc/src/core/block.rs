//! The universal allocation result

use core::fmt;
use core::ptr::{self, NonNull};

/// A contiguous region of raw storage on loan from some allocator
///
/// A block is a pointer plus the size the caller asked for. It carries no
/// ownership information: which allocator issued it is only discoverable
/// through that allocator's [`owns`](crate::Allocator::owns).
///
/// [`Block::EMPTY`] (null pointer, zero size) is the failure value of every
/// allocation and the state a block is reset to once deallocated.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    ptr: Option<NonNull<u8>>,
    size: usize,
}

impl Block {
    /// The empty block
    pub const EMPTY: Self = Self { ptr: None, size: 0 };

    /// Creates a block over `size` bytes starting at `ptr`
    #[inline]
    pub const fn new(ptr: NonNull<u8>, size: usize) -> Self {
        Self {
            ptr: Some(ptr),
            size,
        }
    }

    /// Creates a block from a raw pointer; a null pointer yields [`Block::EMPTY`]
    #[inline]
    pub fn from_raw(ptr: *mut u8, size: usize) -> Self {
        match NonNull::new(ptr) {
            Some(ptr) => Self::new(ptr, size),
            None => Self::EMPTY,
        }
    }

    /// Whether this is the empty (failure / released) block
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    /// Size in bytes the caller requested
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Start of the storage, or null for the empty block
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// Start of the storage, if any
    #[inline]
    pub const fn as_non_null(&self) -> Option<NonNull<u8>> {
        self.ptr
    }

    /// Address of the storage (0 for the empty block)
    #[inline]
    pub fn addr(&self) -> usize {
        self.as_ptr() as usize
    }

    /// One past the last byte of the block
    #[inline]
    pub fn end_addr(&self) -> usize {
        self.addr() + self.size
    }

    /// Returns the block and leaves [`Block::EMPTY`] in its place
    #[inline]
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }

    /// Views the block as a mutable byte slice
    ///
    /// # Safety
    /// - The block must be live (issued and not yet deallocated)
    /// - No other reference to the same bytes may exist for `'a`
    /// - The bytes must have been initialized if they are read
    #[inline]
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        match self.ptr {
            // SAFETY: caller guarantees the block is live, exclusive and
            // `size` bytes long.
            Some(ptr) => unsafe { core::slice::from_raw_parts_mut(ptr.as_ptr(), self.size) },
            None => &mut [],
        }
    }
}

impl Default for Block {
    #[inline]
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Block(empty)")
        } else {
            f.debug_struct("Block")
                .field("ptr", &self.as_ptr())
                .field("size", &self.size)
                .finish()
        }
    }
}
