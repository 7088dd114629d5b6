//! Test allocators and drop probes for spanpool development.
//!
//! - [`TrackingAllocator`] wraps any [`RawAllocator`] and counts live bytes
//!   and calls, optionally failing after a fixed number of successes.
//! - [`DropCounter`] hands out [`DropToken`]s that record when they drop.

#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use spanpool_core::{HeapAllocator, RawAllocator};

/// A [`RawAllocator`] wrapper that records what passes through it.
///
/// `allocations` counts successful `allocate` and `reallocate` calls.
/// When built with [`failing_after`](Self::failing_after), every request
/// after the first `n` successes returns `None`.
#[derive(Debug)]
pub struct TrackingAllocator<A: RawAllocator = HeapAllocator> {
    inner: A,
    live_bytes: AtomicUsize,
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    budget: Option<usize>,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self::wrap(HeapAllocator)
    }

    /// A heap tracker that refuses every request after `n` successes.
    pub fn failing_after(n: usize) -> Self {
        let mut tracker = Self::new();
        tracker.budget = Some(n);
        tracker
    }
}

impl Default for TrackingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: RawAllocator> TrackingAllocator<A> {
    pub fn wrap(inner: A) -> Self {
        Self {
            inner,
            live_bytes: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            deallocations: AtomicUsize::new(0),
            budget: None,
        }
    }

    /// Bytes handed out and not yet returned.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }

    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    pub fn deallocations(&self) -> usize {
        self.deallocations.load(Ordering::Relaxed)
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    fn exhausted(&self) -> bool {
        self.budget
            .is_some_and(|n| self.allocations.load(Ordering::Relaxed) >= n)
    }
}

// SAFETY: every request is forwarded to `inner`, which upholds the contract.
unsafe impl<A: RawAllocator> RawAllocator for TrackingAllocator<A> {
    fn allocate(&self, bytes: usize) -> Option<NonNull<u8>> {
        if self.exhausted() {
            return None;
        }
        let ptr = self.inner.allocate(bytes)?;
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(bytes, Ordering::Relaxed);
        Some(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize) {
        self.deallocations.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
        unsafe { self.inner.deallocate(ptr, bytes) }
    }

    unsafe fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        old_bytes: usize,
        new_bytes: usize,
    ) -> Option<NonNull<u8>> {
        if self.exhausted() {
            return None;
        }
        let moved = unsafe { self.inner.reallocate(ptr, old_bytes, new_bytes) }?;
        self.allocations.fetch_add(1, Ordering::Relaxed);
        let old = if ptr.is_some() { old_bytes } else { 0 };
        self.live_bytes.fetch_sub(old, Ordering::Relaxed);
        self.live_bytes.fetch_add(new_bytes, Ordering::Relaxed);
        Some(moved)
    }
}

/// Counts how many of its [`DropToken`]s have been dropped.
#[derive(Clone, Debug, Default)]
pub struct DropCounter {
    dropped: Arc<AtomicUsize>,
}

impl DropCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh token that bumps this counter when dropped.
    pub fn token(&self) -> DropToken {
        DropToken {
            dropped: Arc::clone(&self.dropped),
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// Element type whose drop is observable through a [`DropCounter`].
#[derive(Debug)]
pub struct DropToken {
    dropped: Arc<AtomicUsize>,
}

impl Drop for DropToken {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}
