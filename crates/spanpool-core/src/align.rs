//! Machine-word alignment arithmetic.
//!
//! All helpers are checked: rounding that would overflow `usize` returns
//! `None` rather than wrapping, so callers can surface it as exhaustion.

use std::mem;

/// Size of one machine word in bytes.
///
/// Block headers in the region allocator are exactly one word, and every
/// block extent is a multiple of it.
pub const WORD: usize = mem::size_of::<usize>();

/// Minimum alignment of every pointer handed out through
/// [`RawAllocator`](crate::RawAllocator).
pub const MIN_ALIGN: usize = WORD;

/// Round `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. Returns `None` on overflow.
#[inline]
pub const fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

/// Round `value` down to the previous multiple of `align`.
///
/// `align` must be a power of two.
#[inline]
pub const fn align_down(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

/// Whether `value` is a multiple of `align` (a power of two).
#[inline]
pub const fn is_aligned(value: usize, align: usize) -> bool {
    value & (align - 1) == 0
}

/// Round `value` up to machine-word alignment.
#[inline]
pub const fn word_align(value: usize) -> Option<usize> {
    align_up(value, WORD)
}

/// Round `value` up to a multiple of `unit`, which need not be a power of two.
///
/// A `unit` of zero is treated as one. Returns `None` on overflow.
#[inline]
pub const fn round_to_multiple(value: usize, unit: usize) -> Option<usize> {
    let unit = if unit == 0 { 1 } else { unit };
    let rem = value % unit;
    if rem == 0 {
        Some(value)
    } else {
        value.checked_add(unit - rem)
    }
}
