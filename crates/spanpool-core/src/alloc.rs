//! The allocator capability consumed by buffers.
//!
//! [`RawAllocator`] is deliberately narrow: byte counts in, word-aligned
//! pointers out, `None` on exhaustion. It knows nothing about element types
//! or construction; the buffer layered on top handles both.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use crate::align::MIN_ALIGN;

/// A source of raw byte spans.
///
/// Exhaustion is reported as `None` and must leave the allocator's state
/// unchanged. Implementations use interior mutability where they need it, so
/// every method takes `&self`.
///
/// # Safety
///
/// Implementors must guarantee that every pointer returned by
/// [`allocate`](Self::allocate) or [`reallocate`](Self::reallocate):
///
/// - is aligned to at least [`MIN_ALIGN`],
/// - is valid for reads and writes of the requested number of bytes,
/// - does not overlap any other live allocation from the same allocator,
/// - stays valid until passed to [`deallocate`](Self::deallocate) or
///   [`reallocate`](Self::reallocate).
pub unsafe trait RawAllocator {
    /// Allocate at least `bytes` bytes.
    fn allocate(&self, bytes: usize) -> Option<NonNull<u8>>;

    /// Release an allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator for a request of
    /// `bytes` bytes and must not have been released already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize);

    /// Resize an allocation, moving it if necessary.
    ///
    /// A `None` pointer behaves like [`allocate`](Self::allocate). On
    /// failure the old allocation is left intact and `None` is returned.
    ///
    /// # Safety
    ///
    /// When `ptr` is `Some`, it must satisfy the contract of
    /// [`deallocate`](Self::deallocate) for `old_bytes`.
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old_bytes: usize,
        new_bytes: usize,
    ) -> Option<NonNull<u8>> {
        let Some(old) = ptr else {
            return self.allocate(new_bytes);
        };
        let new = self.allocate(new_bytes)?;
        // SAFETY: both spans are live, distinct allocations of at least the
        // copied length.
        unsafe {
            ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), old_bytes.min(new_bytes));
            self.deallocate(old, old_bytes);
        }
        Some(new)
    }
}

// SAFETY: forwards to the referenced allocator, which upholds the contract.
unsafe impl<A: RawAllocator + ?Sized> RawAllocator for &A {
    #[inline]
    fn allocate(&self, bytes: usize) -> Option<NonNull<u8>> {
        (**self).allocate(bytes)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize) {
        unsafe { (**self).deallocate(ptr, bytes) }
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old_bytes: usize,
        new_bytes: usize,
    ) -> Option<NonNull<u8>> {
        unsafe { (**self).reallocate(ptr, old_bytes, new_bytes) }
    }
}

// SAFETY: forwards to the shared allocator, which upholds the contract.
unsafe impl<A: RawAllocator + ?Sized> RawAllocator for Arc<A> {
    #[inline]
    fn allocate(&self, bytes: usize) -> Option<NonNull<u8>> {
        (**self).allocate(bytes)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize) {
        unsafe { (**self).deallocate(ptr, bytes) }
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old_bytes: usize,
        new_bytes: usize,
    ) -> Option<NonNull<u8>> {
        unsafe { (**self).reallocate(ptr, old_bytes, new_bytes) }
    }
}

/// Forwards every request to the process heap.
///
/// This is the default allocator for buffers. Zero-byte requests are served
/// as one-byte allocations so the returned pointer is always unique.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapAllocator;

impl HeapAllocator {
    fn layout(bytes: usize) -> Option<Layout> {
        Layout::from_size_align(bytes.max(1), MIN_ALIGN).ok()
    }
}

// SAFETY: the global allocator returns unique, live spans aligned to the
// requested layout, which always carries `MIN_ALIGN`.
unsafe impl RawAllocator for HeapAllocator {
    fn allocate(&self, bytes: usize) -> Option<NonNull<u8>> {
        let layout = Self::layout(bytes)?;
        // SAFETY: `layout` has a non-zero size.
        NonNull::new(unsafe { alloc::alloc(layout) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize) {
        // The layout was valid when the span was allocated, so it still is.
        if let Some(layout) = Self::layout(bytes) {
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }

    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old_bytes: usize,
        new_bytes: usize,
    ) -> Option<NonNull<u8>> {
        let Some(old) = ptr else {
            return self.allocate(new_bytes);
        };
        let old_layout = Self::layout(old_bytes)?;
        // Reject sizes that would overflow `isize` once rounded to the alignment.
        let new_layout = Self::layout(new_bytes)?;
        // SAFETY: `old` came from this allocator with `old_layout`, and the
        // new size is non-zero and valid for the same alignment.
        NonNull::new(unsafe { alloc::realloc(old.as_ptr(), old_layout, new_layout.size()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_allocation_is_word_aligned() {
        let heap = HeapAllocator;
        for bytes in [1, 3, 8, 17, 1024] {
            let ptr = heap.allocate(bytes).unwrap();
            assert_eq!(ptr.as_ptr() as usize % MIN_ALIGN, 0);
            unsafe { heap.deallocate(ptr, bytes) };
        }
    }

    #[test]
    fn heap_zero_byte_allocation_is_non_null() {
        let heap = HeapAllocator;
        let ptr = heap.allocate(0).unwrap();
        unsafe { heap.deallocate(ptr, 0) };
    }

    #[test]
    fn heap_oversized_request_is_none() {
        assert!(HeapAllocator.allocate(usize::MAX).is_none());
    }

    #[test]
    fn heap_reallocate_preserves_prefix() {
        let heap = HeapAllocator;
        let ptr = heap.allocate(16).unwrap();
        unsafe {
            for i in 0..16 {
                ptr.as_ptr().add(i).write(i as u8);
            }
            let grown = heap.reallocate(Some(ptr), 16, 256).unwrap();
            for i in 0..16 {
                assert_eq!(grown.as_ptr().add(i).read(), i as u8);
            }
            heap.deallocate(grown, 256);
        }
    }

    #[test]
    fn reallocate_none_allocates() {
        let heap = HeapAllocator;
        let ptr = unsafe { heap.reallocate(None, 0, 32) }.unwrap();
        unsafe { heap.deallocate(ptr, 32) };
    }

    /// Uses the trait's default `reallocate` through a wrapper that only
    /// provides `allocate` and `deallocate`.
    struct Plain;

    unsafe impl RawAllocator for Plain {
        fn allocate(&self, bytes: usize) -> Option<NonNull<u8>> {
            HeapAllocator.allocate(bytes)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize) {
            unsafe { HeapAllocator.deallocate(ptr, bytes) }
        }
    }

    #[test]
    fn default_reallocate_copies_and_shrinks() {
        let plain = Plain;
        let ptr = plain.allocate(8).unwrap();
        unsafe {
            ptr.as_ptr().copy_from_nonoverlapping([1u8, 2, 3, 4, 5, 6, 7, 8].as_ptr(), 8);
            let smaller = plain.reallocate(Some(ptr), 8, 4).unwrap();
            let bytes = std::slice::from_raw_parts(smaller.as_ptr(), 4);
            assert_eq!(bytes, &[1, 2, 3, 4]);
            plain.deallocate(smaller, 4);
        }
    }

    #[test]
    fn reference_and_arc_forward() {
        let heap = HeapAllocator;
        let by_ref = &heap;
        let ptr = by_ref.allocate(8).unwrap();
        unsafe { by_ref.deallocate(ptr, 8) };

        let shared = Arc::new(HeapAllocator);
        let ptr = shared.allocate(8).unwrap();
        unsafe { shared.deallocate(ptr, 8) };
    }
}
