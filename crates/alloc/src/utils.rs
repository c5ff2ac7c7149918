//! Alignment arithmetic shared by every strategy

use crate::platform::DEFAULT_ALIGNMENT;

/// Rounds `size` up to the next multiple of `alignment`
///
/// `alignment` must be a power of two. The result is the smallest multiple of
/// `alignment` that is `>= size`.
///
/// # Examples
/// ```
/// use nebula_alloc::round_to_aligned;
///
/// assert_eq!(round_to_aligned(7, 8), 8);
/// assert_eq!(round_to_aligned(8, 8), 8);
/// assert_eq!(round_to_aligned(9, 8), 16);
/// assert_eq!(round_to_aligned(0, 16), 0);
/// ```
#[inline(always)]
pub const fn round_to_aligned(size: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (size + (alignment - 1)) & !(alignment - 1)
}

/// Same as [`round_to_aligned`], but returns `None` instead of wrapping when
/// the rounded value does not fit in `usize`
#[inline]
pub const fn checked_round_to_aligned(size: usize, alignment: usize) -> Option<usize> {
    match size.checked_add(alignment - 1) {
        Some(padded) => Some(padded & !(alignment - 1)),
        None => None,
    }
}

/// Rounds `size` to [`DEFAULT_ALIGNMENT`]
#[inline(always)]
pub const fn round_to_default(size: usize) -> usize {
    round_to_aligned(size, DEFAULT_ALIGNMENT)
}

/// Aligns an address up to `alignment`
#[inline(always)]
pub const fn align_up(addr: usize, alignment: usize) -> usize {
    round_to_aligned(addr, alignment)
}

/// Checks if a value is a power of two (zero is not)
#[inline(always)]
pub const fn is_power_of_two(value: usize) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

/// Checks if `value` is a multiple of `alignment`
///
/// # Examples
/// ```
/// use nebula_alloc::utils::is_aligned;
///
/// assert!(is_aligned(16, 8));
/// assert!(!is_aligned(17, 8));
/// ```
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    value & (alignment - 1) == 0
}
