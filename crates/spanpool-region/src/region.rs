//! The thread-safe region allocator.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error};
use spanpool_core::align::{align_down, word_align};
use spanpool_core::{RawAllocator, SpinLock, WORD};

use crate::arena::Arena;
use crate::raw::RawSpan;
use crate::stats::RegionStats;

/// Where the region's span came from.
enum Backing {
    /// Caller-supplied memory; released by the caller.
    Borrowed,
    /// Reserved from the heap once at construction; released on drop.
    Heap(NonNull<[usize]>),
}

/// First-fit sub-allocator over one pre-reserved span.
///
/// After construction the allocator never touches the general-purpose heap:
/// every request is served from the span or fails with `None`. Each mutating
/// call holds the region's spin lock for its whole body, so a region can be
/// shared between threads (typically behind `&` or `Arc`).
///
/// Returned pointers are aligned to one machine word.
///
/// # Examples
///
/// ```
/// use spanpool_region::RegionAllocator;
///
/// let mut memory = [0u8; 1024];
/// let region = RegionAllocator::from_slice(&mut memory);
///
/// let ptr = region.allocate(100).unwrap();
/// assert!(region.allocated() > 100);
///
/// unsafe { region.deallocate(ptr) };
/// assert_eq!(region.allocated(), 0);
/// ```
pub struct RegionAllocator<'a> {
    arena: SpinLock<Arena>,
    /// Mirror of the arena's allocated byte count, readable without the lock.
    allocated: AtomicUsize,
    base_addr: usize,
    capacity: usize,
    backing: Backing,
    _span: PhantomData<&'a mut [u8]>,
}

// SAFETY: all access to the span's headers is serialized by the spin lock;
// the heap backing is only touched in `drop`.
unsafe impl Send for RegionAllocator<'_> {}
// SAFETY: as above; `&self` methods either lock or read atomics/immutables.
unsafe impl Sync for RegionAllocator<'_> {}

impl<'a> RegionAllocator<'a> {
    /// Manage the memory of `span`.
    ///
    /// The start of the span is rounded up to word alignment and the tail is
    /// trimmed to a whole number of words; a span too small for a single
    /// block yields a region on which every allocation fails.
    #[must_use]
    pub fn from_slice(span: &'a mut [u8]) -> Self {
        let len = span.len();
        // SAFETY: the slice is valid, unique, and borrowed for `'a`.
        unsafe { Self::from_raw_parts(span.as_mut_ptr(), len) }
    }

    /// Manage `len` bytes starting at `ptr`.
    ///
    /// # Panics
    ///
    /// If `ptr` is null.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for `'a`, and
    /// must not be accessed through any other pointer while the region is
    /// alive, except through payload pointers the region hands out.
    #[must_use]
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize) -> Self {
        let ptr = NonNull::new(ptr).expect("region span pointer is null");
        let pad = ptr.as_ptr().align_offset(WORD);
        if pad >= len {
            // No aligned word fits: an empty span that is never dereferenced.
            // SAFETY: the dangling base is word aligned and the length is zero.
            let span = unsafe { RawSpan::new(NonNull::<usize>::dangling().cast(), 0) };
            return Self::with_span(span, Backing::Borrowed);
        }
        let usable = align_down(len - pad, WORD);
        // SAFETY: `pad < len`, so the aligned base stays inside the caller's
        // span and `usable` bytes follow it.
        let base = unsafe { NonNull::new_unchecked(ptr.as_ptr().add(pad)) };
        // SAFETY: `base` is word aligned, `usable` is a word multiple, and the
        // caller grants exclusive access to the span for `'a`.
        let span = unsafe { RawSpan::new(base, usable) };
        Self::with_span(span, Backing::Borrowed)
    }

    fn with_span(span: RawSpan, backing: Backing) -> Self {
        let base_addr = span.base_addr();
        let arena = Arena::new(span);
        let capacity = arena.capacity();
        debug!("region created: {capacity} usable bytes at {base_addr:#x}");
        Self {
            arena: SpinLock::new(arena),
            allocated: AtomicUsize::new(0),
            base_addr,
            capacity,
            backing,
            _span: PhantomData,
        }
    }

    /// Allocate at least `bytes` bytes.
    ///
    /// Returns `None`, with the region unchanged, if no single free run is
    /// large enough.
    pub fn allocate(&self, bytes: usize) -> Option<NonNull<u8>> {
        let mut arena = self.arena.lock();
        let Some(payload) = arena.allocate(bytes) else {
            debug!(
                "region exhausted: no free run for {bytes} bytes ({} of {} bytes allocated)",
                arena.allocated(),
                self.capacity
            );
            return None;
        };
        self.allocated.store(arena.allocated(), Ordering::Relaxed);
        Some(arena.span().ptr_at(payload))
    }

    /// Release an allocation. Neighbouring free blocks are not merged.
    ///
    /// # Panics
    ///
    /// If `ptr` does not lie inside this region or its block is already free.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this region's `allocate` or
    /// `reallocate` and not released since.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>) {
        let payload = self.payload_offset(ptr);
        let mut arena = self.arena.lock();
        arena.deallocate(payload);
        self.allocated.store(arena.allocated(), Ordering::Relaxed);
    }

    /// Resize an allocation to at least `bytes` bytes.
    ///
    /// `None` behaves like [`allocate`](Self::allocate). Shrinking happens in
    /// place; growing moves the payload when the current block is too small.
    /// On failure the original allocation is left untouched and `None` is
    /// returned.
    ///
    /// # Safety
    ///
    /// When `ptr` is `Some`, it must satisfy the contract of
    /// [`deallocate`](Self::deallocate).
    pub unsafe fn reallocate(&self, ptr: Option<NonNull<u8>>, bytes: usize) -> Option<NonNull<u8>> {
        let Some(ptr) = ptr else {
            return self.allocate(bytes);
        };
        let payload = self.payload_offset(ptr);
        let mut arena = self.arena.lock();
        let Some(moved) = arena.reallocate(payload, bytes) else {
            debug!("region exhausted: cannot grow block at offset {payload} to {bytes} bytes");
            return None;
        };
        self.allocated.store(arena.allocated(), Ordering::Relaxed);
        Some(arena.span().ptr_at(moved))
    }

    fn payload_offset(&self, ptr: NonNull<u8>) -> usize {
        assert!(
            self.contains(ptr),
            "pointer {ptr:p} does not belong to this region"
        );
        ptr.as_ptr() as usize - self.base_addr
    }

    /// Bytes currently held by allocations, headers included.
    ///
    /// Not synchronized with concurrent mutation; suitable for telemetry.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Bytes not held by allocations. See [`allocated`](Self::allocated).
    pub fn free(&self) -> usize {
        self.capacity - self.allocated()
    }

    /// Usable bytes in the span.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `ptr` points inside this region's span.
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        let addr = ptr.as_ptr() as usize;
        addr >= self.base_addr && addr - self.base_addr < self.capacity
    }

    /// Walk the block list and summarize it.
    pub fn stats(&self) -> RegionStats {
        self.arena.lock().stats()
    }

    /// Join adjacent free blocks.
    ///
    /// Deallocation never merges blocks, so long-running churn can splinter
    /// free space into runs too small for larger requests. This pass
    /// restores contiguous runs without moving any allocation. Returns the
    /// number of block headers removed.
    pub fn merge_free_runs(&self) -> usize {
        let merged = self.arena.lock().merge_free_runs();
        if merged > 0 {
            debug!("region merged {merged} free blocks");
        }
        merged
    }
}

impl RegionAllocator<'static> {
    /// Reserve a span of at least `bytes` bytes from the heap and manage it.
    ///
    /// This is the only heap allocation the region ever makes; the span is
    /// returned to the heap when the region is dropped.
    ///
    /// # Panics
    ///
    /// If the span cannot be reserved. See
    /// [`try_with_capacity`](Self::try_with_capacity).
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self::try_with_capacity(bytes)
            .unwrap_or_else(|| panic!("cannot reserve a {bytes}-byte region span"))
    }

    /// Like [`with_capacity`](Self::with_capacity), but returns `None` when
    /// the size overflows or the heap refuses the reservation.
    pub fn try_with_capacity(bytes: usize) -> Option<Self> {
        let words = word_align(bytes)? / WORD;
        let mut storage: Vec<usize> = Vec::new();
        if storage.try_reserve_exact(words).is_err() {
            debug!("region reservation of {bytes} bytes failed");
            return None;
        }
        storage.resize(words, 0);
        let storage: Box<[usize]> = storage.into_boxed_slice();
        let raw = NonNull::from(Box::leak(storage));
        let base = raw.cast::<u8>();
        // SAFETY: the boxed slice is word aligned, `words * WORD` bytes long,
        // and owned exclusively by this region until `drop`.
        let span = unsafe { RawSpan::new(base, words * WORD) };
        Some(Self::with_span(span, Backing::Heap(raw)))
    }
}

impl Drop for RegionAllocator<'_> {
    fn drop(&mut self) {
        let outstanding = self.arena.get_mut().allocated();
        if outstanding != 0 {
            error!("region dropped with {outstanding} bytes still allocated");
            if !std::thread::panicking() {
                debug_assert_eq!(
                    outstanding, 0,
                    "region dropped with outstanding allocations"
                );
            }
        }
        if let Backing::Heap(raw) = self.backing {
            // SAFETY: `raw` came from `Box::leak` in `with_capacity` and is
            // released exactly once, here.
            drop(unsafe { Box::from_raw(raw.as_ptr()) });
        }
    }
}

impl fmt::Debug for RegionAllocator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionAllocator")
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated())
            .finish_non_exhaustive()
    }
}

// SAFETY: payloads come from disjoint blocks of the span, are word aligned
// (word-aligned base plus word-multiple offsets), and stay valid until freed.
unsafe impl RawAllocator for RegionAllocator<'_> {
    #[inline]
    fn allocate(&self, bytes: usize) -> Option<NonNull<u8>> {
        RegionAllocator::allocate(self, bytes)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, _bytes: usize) {
        unsafe { RegionAllocator::deallocate(self, ptr) }
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        _old_bytes: usize,
        new_bytes: usize,
    ) -> Option<NonNull<u8>> {
        unsafe { RegionAllocator::reallocate(self, ptr, new_bytes) }
    }
}
