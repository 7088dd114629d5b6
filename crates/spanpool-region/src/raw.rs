//! Bounds-checked word access to the region's backing span.
//!
//! Every read or write of region memory goes through [`RawSpan`]. The rest
//! of the crate works purely in byte offsets; this is the only module that
//! turns an offset into a pointer.

#![allow(unsafe_code)]

use std::ptr::{self, NonNull};

use spanpool_core::align::is_aligned;
use spanpool_core::WORD;

/// A word-aligned byte span addressed by offset.
#[derive(Debug)]
pub(crate) struct RawSpan {
    base: NonNull<u8>,
    len: usize,
}

// SAFETY: the span is plain memory; exclusive access to header words is
// enforced by the owning arena's lock.
unsafe impl Send for RawSpan {}

impl RawSpan {
    /// # Safety
    ///
    /// `base` must be aligned to [`WORD`] and valid for reads and writes of
    /// `len` bytes for as long as the span is used, and no other code may
    /// access those bytes except through payload pointers handed out by the
    /// arena. `len` must be a multiple of [`WORD`].
    pub(crate) unsafe fn new(base: NonNull<u8>, len: usize) -> Self {
        debug_assert!(is_aligned(base.as_ptr() as usize, WORD));
        debug_assert!(is_aligned(len, WORD));
        Self { base, len }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    fn check_word(&self, offset: usize) {
        assert!(
            is_aligned(offset, WORD) && offset.checked_add(WORD).is_some_and(|end| end <= self.len),
            "word access at offset {offset} outside span of {} bytes",
            self.len
        );
    }

    /// Read the word at `offset`.
    pub(crate) fn read_word(&self, offset: usize) -> usize {
        self.check_word(offset);
        // SAFETY: in bounds and word aligned (checked above, base is aligned).
        unsafe { self.base.as_ptr().add(offset).cast::<usize>().read() }
    }

    /// Write the word at `offset`.
    pub(crate) fn write_word(&mut self, offset: usize, value: usize) {
        self.check_word(offset);
        // SAFETY: in bounds and word aligned (checked above, base is aligned).
        unsafe { self.base.as_ptr().add(offset).cast::<usize>().write(value) }
    }

    /// Copy `count` bytes from offset `src` to offset `dst`.
    ///
    /// The ranges must be in bounds and must not overlap.
    pub(crate) fn copy_nonoverlapping(&mut self, src: usize, dst: usize, count: usize) {
        let src_end = src.checked_add(count).filter(|&end| end <= self.len);
        let dst_end = dst.checked_add(count).filter(|&end| end <= self.len);
        let (Some(src_end), Some(dst_end)) = (src_end, dst_end) else {
            panic!("copy of {count} bytes from {src} to {dst} outside span of {} bytes", self.len);
        };
        assert!(
            src_end <= dst || dst_end <= src,
            "overlapping copy of {count} bytes from {src} to {dst}"
        );
        // SAFETY: both ranges are in bounds and disjoint (checked above).
        unsafe {
            ptr::copy_nonoverlapping(
                self.base.as_ptr().add(src),
                self.base.as_ptr().add(dst),
                count,
            );
        }
    }

    /// Pointer to the byte at `offset`.
    pub(crate) fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        assert!(offset <= self.len, "offset {offset} outside span of {} bytes", self.len);
        // SAFETY: `offset` is within (or one past) the span, so the result
        // is in bounds of the same allocation and non-null.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }

    /// Address of the first byte of the span.
    pub(crate) fn base_addr(&self) -> usize {
        self.base.as_ptr() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(words: &mut [usize]) -> RawSpan {
        let len = words.len() * WORD;
        let base = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
        unsafe { RawSpan::new(base, len) }
    }

    #[test]
    fn word_roundtrip() {
        let mut words = [0usize; 4];
        let mut raw = span(&mut words);
        raw.write_word(WORD, 0xDEAD);
        assert_eq!(raw.read_word(WORD), 0xDEAD);
        assert_eq!(raw.read_word(0), 0);
    }

    #[test]
    #[should_panic(expected = "outside span")]
    fn read_past_end_panics() {
        let mut words = [0usize; 2];
        let raw = span(&mut words);
        raw.read_word(2 * WORD);
    }

    #[test]
    #[should_panic(expected = "outside span")]
    fn unaligned_read_panics() {
        let mut words = [0usize; 2];
        let raw = span(&mut words);
        raw.read_word(1);
    }

    #[test]
    fn copy_moves_bytes() {
        let mut words = [7usize, 9, 0, 0];
        let mut raw = span(&mut words);
        raw.copy_nonoverlapping(0, 2 * WORD, 2 * WORD);
        assert_eq!(raw.read_word(2 * WORD), 7);
        assert_eq!(raw.read_word(3 * WORD), 9);
    }

    #[test]
    #[should_panic(expected = "overlapping copy")]
    fn overlapping_copy_panics() {
        let mut words = [0usize; 4];
        let mut raw = span(&mut words);
        raw.copy_nonoverlapping(0, WORD, 2 * WORD);
    }
}
