//! Owned and borrowed element storage.
//!
//! [`Storage`] is the ownership state of a buffer. An `Owned` allocation is
//! released through the buffer's allocator; a `Borrowed` span belongs to
//! someone else and is never released. Moving between the two is always an
//! explicit operation on the buffer.

use std::ptr::{self, NonNull};

/// A span obtained from a [`RawAllocator`](spanpool_core::RawAllocator).
///
/// `ptr` may sit past `origin` when the buffer's alignment exceeds what the
/// allocator guarantees; `origin` and `bytes` are what must be handed back.
/// Zero-byte allocations (zero capacity or zero-sized elements) never touch
/// the allocator and carry a dangling, suitably aligned pointer.
#[derive(Debug)]
pub(crate) struct Allocation<T> {
    pub(crate) ptr: NonNull<T>,
    pub(crate) capacity: usize,
    pub(crate) origin: NonNull<u8>,
    pub(crate) bytes: usize,
}

impl<T> Allocation<T> {
    /// An allocation that owns no memory.
    pub(crate) fn dangling(capacity: usize, align: usize) -> Self {
        let ptr = NonNull::new(ptr::without_provenance_mut::<T>(align))
            .unwrap_or(NonNull::dangling());
        Self {
            ptr,
            capacity,
            origin: ptr.cast(),
            bytes: 0,
        }
    }

    /// Whether releasing this allocation must go through the allocator.
    pub(crate) fn is_backed(&self) -> bool {
        self.bytes != 0
    }
}

/// Ownership state of a buffer's elements.
#[derive(Debug)]
pub(crate) enum Storage<T> {
    /// Memory obtained from the buffer's allocator; released on drop.
    Owned(Allocation<T>),
    /// Memory owned elsewhere; never released by the buffer.
    Borrowed {
        ptr: NonNull<T>,
        /// `false` for views injected from shared references.
        writable: bool,
    },
}

impl<T> Storage<T> {
    pub(crate) fn empty(align: usize) -> Self {
        Self::Owned(Allocation::dangling(0, align))
    }

    /// An empty borrowed view: what a buffer becomes after its storage is
    /// moved out.
    pub(crate) fn shell(align: usize) -> Self {
        Self::Borrowed {
            ptr: Allocation::<T>::dangling(0, align).ptr,
            writable: true,
        }
    }

    pub(crate) fn ptr(&self) -> NonNull<T> {
        match self {
            Self::Owned(allocation) => allocation.ptr,
            Self::Borrowed { ptr, .. } => *ptr,
        }
    }

    pub(crate) fn is_borrowed(&self) -> bool {
        matches!(self, Self::Borrowed { .. })
    }

    pub(crate) fn is_writable(&self) -> bool {
        match self {
            Self::Owned(_) => true,
            Self::Borrowed { writable, .. } => *writable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangling_respects_alignment() {
        let allocation = Allocation::<u8>::dangling(4, 64);
        assert_eq!(allocation.ptr.as_ptr() as usize % 64, 0);
        assert_eq!(allocation.capacity, 4);
        assert!(!allocation.is_backed());
    }

    #[test]
    fn empty_is_owned_and_writable() {
        let storage = Storage::<u32>::empty(4);
        assert!(!storage.is_borrowed());
        assert!(storage.is_writable());
    }

    #[test]
    fn shell_is_borrowed() {
        let storage = Storage::<u32>::shell(4);
        assert!(storage.is_borrowed());
        assert!(storage.is_writable());
        assert_eq!(storage.ptr().as_ptr() as usize % 4, 0);
    }
}
