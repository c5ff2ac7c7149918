//! Typed construction on top of any [`Allocator`]
//!
//! [`create`] and [`create_array`] allocate storage, move values into it and
//! hand back a typed handle. [`destroy`] and [`destroy_array`] drop the
//! values, zero the storage and return it to the same allocator.
//!
//! Handles do not free themselves: dropping one without passing it to the
//! matching `destroy` function leaks the storage and never runs `T`'s
//! destructor.
//!
//! # Examples
//! ```
//! use nebula_alloc::{HeapAllocator, object};
//!
//! # fn main() -> nebula_alloc::AllocResult<()> {
//! let mut heap = HeapAllocator::new();
//!
//! let mut point = object::create(&mut heap, (3_i32, 4_i32))?;
//! point.0 += 1;
//! assert_eq!(*point, (4, 4));
//!
//! let squares = object::create_array(&mut heap, 4, 0_u64)?;
//! assert_eq!(squares.len(), 4);
//! assert!(squares.get(4).is_err());
//!
//! unsafe {
//!     object::destroy(&mut heap, point);
//!     object::destroy_array(&mut heap, squares);
//! }
//! # Ok(())
//! # }
//! ```

use core::fmt;
use core::mem;
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use crate::core::{Allocator, Block};
use crate::error::{AllocError, AllocResult};

/// One `T` living in allocator-issued storage
#[must_use = "an instance leaks unless passed to `object::destroy`"]
pub struct Instance<T> {
    value: NonNull<T>,
    block: Block,
}

/// `len` consecutive `T`s living in allocator-issued storage
#[must_use = "an array leaks unless passed to `object::destroy_array`"]
pub struct ArrayInstance<T> {
    values: NonNull<T>,
    len: usize,
    block: Block,
}

/// Allocates storage for one `T` and moves `value` into it
///
/// # Errors
/// [`AllocError::NotEnoughMemory`] if the allocator returns an empty block.
pub fn create<T, A: Allocator>(alloc: &mut A, value: T) -> AllocResult<Instance<T>> {
    let block = alloc.allocate(mem::size_of::<T>(), mem::align_of::<T>());
    let storage = block
        .as_non_null()
        .ok_or_else(|| AllocError::not_enough_memory(mem::size_of::<T>()))?
        .cast::<T>();

    // SAFETY: the block is sized and aligned for one `T` and unused.
    unsafe { storage.as_ptr().write(value) };
    Ok(Instance {
        value: storage,
        block,
    })
}

/// Allocates storage for `len` values and fills each with a clone of `fill`
///
/// # Errors
/// - [`AllocError::EmptyContainer`] if `len == 0`
/// - [`AllocError::SizeOverflow`] if `len * size_of::<T>()` overflows
/// - [`AllocError::NotEnoughMemory`] if the allocator returns an empty block
pub fn create_array<T: Clone, A: Allocator>(
    alloc: &mut A,
    len: usize,
    fill: T,
) -> AllocResult<ArrayInstance<T>> {
    if len == 0 {
        return Err(AllocError::EmptyContainer);
    }
    let size = mem::size_of::<T>()
        .checked_mul(len)
        .ok_or_else(|| AllocError::size_overflow("array byte size"))?;

    let block = alloc.allocate(size, mem::align_of::<T>());
    let storage = block
        .as_non_null()
        .ok_or_else(|| AllocError::not_enough_memory(size))?
        .cast::<T>();

    // SAFETY: the block holds `len` properly aligned `T` slots.
    unsafe {
        for i in 0..len - 1 {
            storage.add(i).as_ptr().write(fill.clone());
        }
        storage.add(len - 1).as_ptr().write(fill);
    }

    Ok(ArrayInstance {
        values: storage,
        len,
        block,
    })
}

/// Drops the value, zeroes its storage and deallocates it
///
/// # Safety
/// `instance` must have been created from `alloc`.
pub unsafe fn destroy<T, A: Allocator>(alloc: &mut A, instance: Instance<T>) {
    let Instance { value, mut block } = instance;
    // SAFETY: the value is initialized and dropped exactly once; the block is
    // live and `block.size()` bytes long.
    unsafe {
        ptr::drop_in_place(value.as_ptr());
        ptr::write_bytes(block.as_ptr(), 0, block.size());
        alloc.deallocate(&mut block);
    }
}

/// Drops every element, zeroes the storage and deallocates it
///
/// # Safety
/// `array` must have been created from `alloc`.
pub unsafe fn destroy_array<T, A: Allocator>(alloc: &mut A, array: ArrayInstance<T>) {
    let ArrayInstance {
        values,
        len,
        mut block,
    } = array;
    // SAFETY: all `len` elements are initialized and dropped exactly once.
    unsafe {
        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(values.as_ptr(), len));
        ptr::write_bytes(block.as_ptr(), 0, block.size());
        alloc.deallocate(&mut block);
    }
}

impl<T> Instance<T> {
    /// Raw pointer to the value
    pub fn as_ptr(&self) -> *mut T {
        self.value.as_ptr()
    }

    /// The block backing the value
    pub fn block(&self) -> &Block {
        &self.block
    }
}

impl<T> Deref for Instance<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the value is initialized until `destroy` consumes the handle.
        unsafe { self.value.as_ref() }
    }
}

impl<T> DerefMut for Instance<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as in `deref`; `&mut self` is exclusive.
        unsafe { self.value.as_mut() }
    }
}

impl<T: fmt::Debug> fmt::Debug for Instance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&**self).finish()
    }
}

impl<T> ArrayInstance<T> {
    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: empty arrays cannot be created
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bounds-checked element access
    ///
    /// # Errors
    /// [`AllocError::OutOfBounds`] if `index >= len`.
    pub fn get(&self, index: usize) -> AllocResult<&T> {
        self.as_slice()
            .get(index)
            .ok_or_else(|| AllocError::out_of_bounds(index, self.len))
    }

    /// Bounds-checked mutable element access
    ///
    /// # Errors
    /// [`AllocError::OutOfBounds`] if `index >= len`.
    pub fn get_mut(&mut self, index: usize) -> AllocResult<&mut T> {
        let len = self.len;
        self.as_mut_slice()
            .get_mut(index)
            .ok_or_else(|| AllocError::out_of_bounds(index, len))
    }

    /// The elements as a slice
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `len` initialized elements live at `values`.
        unsafe { core::slice::from_raw_parts(self.values.as_ptr(), self.len) }
    }

    /// The elements as a mutable slice
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as in `as_slice`; `&mut self` is exclusive.
        unsafe { core::slice::from_raw_parts_mut(self.values.as_ptr(), self.len) }
    }

    /// The block backing the elements
    pub fn block(&self) -> &Block {
        &self.block
    }
}

impl<T> Deref for ArrayInstance<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for ArrayInstance<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for ArrayInstance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArrayInstance").field(&self.as_slice()).finish()
    }
}
