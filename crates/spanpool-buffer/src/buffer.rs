//! The growable buffer.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::slice;

use log::{debug, trace};
use spanpool_core::align::round_to_multiple;
use spanpool_core::{HeapAllocator, RawAllocator, MIN_ALIGN};

use crate::config::BufferConfig;
use crate::error::{BufferError, ConfigError};
use crate::storage::{Allocation, Storage};

/// Whether a resize may give reserved capacity back to the allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CapacityPolicy {
    /// Keep reserved capacity when shrinking.
    #[default]
    Retain,
    /// Reallocate to the smaller chunked capacity when shrinking.
    Downsize,
}

/// A resizable array over memory from a [`RawAllocator`].
///
/// A buffer either **owns** its storage, obtained from `A` and released on
/// drop, or **borrows** storage injected from outside, which it never
/// releases. Borrowed storage reports a [`capacity`](Self::capacity) of zero.
/// Growing a borrowed buffer copies its elements into fresh owned storage.
///
/// Reserved capacity grows in multiples of [`BufferConfig::chunk`]
/// elements. Storage is never shrunk implicitly; see [`CapacityPolicy`].
///
/// Buffers are not internally synchronized and are not `Clone`: use
/// [`set`](Self::set) for an explicit deep copy and [`take`](Self::take) to
/// move storage out of a buffer you only hold by `&mut`.
///
/// # Examples
///
/// ```
/// use spanpool_buffer::Buffer;
///
/// let mut buf: Buffer<'_, u32> = Buffer::new();
/// buf.push(1).unwrap();
/// buf.push(2).unwrap();
/// buf.push(3).unwrap();
///
/// let removed = buf.remove(0);
/// assert_eq!(removed, 1);
/// assert_eq!(&buf[..], &[3, 2]);
/// ```
pub struct Buffer<'a, T, A: RawAllocator = HeapAllocator> {
    storage: Storage<T>,
    len: usize,
    config: BufferConfig,
    alloc: A,
    _marker: PhantomData<(&'a mut [T], T)>,
}

// SAFETY: the buffer owns its elements or holds a `&mut [T]` or `&[T]` view
// of them; read-only views alias shared data, hence the `Sync` bound.
unsafe impl<T: Send + Sync, A: RawAllocator + Send> Send for Buffer<'_, T, A> {}
// SAFETY: `&Buffer` only gives out `&T` and `&A`.
unsafe impl<T: Sync, A: RawAllocator + Sync> Sync for Buffer<'_, T, A> {}

impl<'a, T> Buffer<'a, T> {
    /// An empty heap-backed buffer with the default configuration.
    pub fn new() -> Self {
        Self::new_in(HeapAllocator)
    }

    /// An empty heap-backed buffer with `config`.
    pub fn with_config(config: BufferConfig) -> Result<Self, ConfigError> {
        Self::with_config_in(config, HeapAllocator)
    }
}

impl<'a, T> Default for Buffer<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T, A: RawAllocator> Buffer<'a, T, A> {
    /// An empty buffer drawing storage from `alloc`.
    pub fn new_in(alloc: A) -> Self {
        let config = BufferConfig::new();
        let align = effective_alignment::<T>(&config);
        Self {
            storage: Storage::empty(align),
            len: 0,
            config,
            alloc,
            _marker: PhantomData,
        }
    }

    /// An empty buffer drawing storage from `alloc`, configured by `config`.
    pub fn with_config_in(config: BufferConfig, alloc: A) -> Result<Self, ConfigError> {
        config.validate()?;
        let align = effective_alignment::<T>(&config);
        Ok(Self {
            storage: Storage::empty(align),
            len: 0,
            config,
            alloc,
            _marker: PhantomData,
        })
    }

    // ── accessors ────────────────────────────────────────────────

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reserved element capacity of owned storage; zero for borrowed storage.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Owned(allocation) => allocation.capacity,
            Storage::Borrowed { .. } => 0,
        }
    }

    /// Whether the storage is borrowed: injected, disowned, or moved out.
    ///
    /// Borrowed storage is never released by the buffer.
    pub fn injected(&self) -> bool {
        self.storage.is_borrowed()
    }

    /// Whether the storage is a read-only view from [`inject_const`](Self::inject_const).
    pub fn is_read_only(&self) -> bool {
        !self.storage.is_writable()
    }

    /// Byte alignment of the element storage.
    pub fn alignment(&self) -> usize {
        effective_alignment::<T>(&self.config)
    }

    /// Growth granularity in elements.
    pub fn chunk(&self) -> usize {
        self.config.chunk
    }

    /// The buffer's configuration.
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// The allocator backing owned storage.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Pointer to the first element.
    pub fn as_ptr(&self) -> *const T {
        self.storage.ptr().as_ptr()
    }

    /// Mutable pointer to the first element.
    ///
    /// # Panics
    ///
    /// If the storage is a read-only view.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.writable_ptr().as_ptr()
    }

    /// The live elements.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `[0, len)` are initialized elements of the current storage.
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// The live elements, mutably.
    ///
    /// # Panics
    ///
    /// If the storage is a read-only view.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let ptr = self.writable_ptr();
        // SAFETY: `[0, len)` are initialized and the storage is writable.
        unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), self.len) }
    }

    fn writable_ptr(&mut self) -> NonNull<T> {
        assert!(
            self.storage.is_writable(),
            "mutable access to a read-only buffer view"
        );
        self.storage.ptr()
    }

    /// Elements the current storage can hold without reallocating.
    fn reserved(&self) -> usize {
        match &self.storage {
            Storage::Owned(allocation) => allocation.capacity,
            Storage::Borrowed { .. } => self.len,
        }
    }

    fn chunked(&self, elements: usize) -> Result<usize, BufferError> {
        round_to_multiple(elements, self.config.chunk)
            .ok_or(BufferError::CapacityOverflow { elements })
    }

    // ── storage management ───────────────────────────────────────

    fn allocate_storage(&self, capacity: usize) -> Result<Allocation<T>, BufferError> {
        let align = self.alignment();
        let elements = mem::size_of::<T>()
            .checked_mul(capacity)
            .ok_or(BufferError::CapacityOverflow { elements: capacity })?;
        if elements == 0 {
            return Ok(Allocation::dangling(capacity, align));
        }
        let pad = align.saturating_sub(MIN_ALIGN);
        let bytes = elements
            .checked_add(pad)
            .filter(|&b| b <= isize::MAX as usize)
            .ok_or(BufferError::CapacityOverflow { elements: capacity })?;
        let Some(origin) = self.alloc.allocate(bytes) else {
            debug!("buffer allocation of {bytes} bytes failed");
            return Err(BufferError::AllocationFailed { bytes });
        };
        // The allocator guarantees `MIN_ALIGN`, so the offset fits in `pad`.
        let offset = origin.as_ptr().align_offset(align);
        debug_assert!(offset <= pad);
        // SAFETY: `offset <= pad` keeps the element span inside the allocation.
        let ptr = unsafe { NonNull::new_unchecked(origin.as_ptr().add(offset)) }.cast::<T>();
        Ok(Allocation {
            ptr,
            capacity,
            origin,
            bytes,
        })
    }

    /// Return owned storage to the allocator. Elements must already be dropped
    /// or moved out.
    fn release(&self, allocation: Allocation<T>) {
        if allocation.is_backed() {
            // SAFETY: `origin`/`bytes` are exactly what `allocate_storage`
            // obtained from this allocator, and each allocation is released once.
            unsafe { self.alloc.deallocate(allocation.origin, allocation.bytes) }
        }
    }

    /// Move the live elements into storage for `capacity` elements.
    ///
    /// The previous owned storage is released only after the elements have
    /// been copied. On failure nothing changes.
    fn reallocate(&mut self, capacity: usize) -> Result<(), BufferError> {
        debug_assert!(self.len <= capacity);
        let pad = self.alignment().saturating_sub(MIN_ALIGN);

        if let Storage::Owned(old) = &self.storage {
            if old.is_backed() && pad == 0 {
                let bytes = mem::size_of::<T>()
                    .checked_mul(capacity)
                    .ok_or(BufferError::CapacityOverflow { elements: capacity })?;
                if bytes != 0 {
                    // SAFETY: `old` came from this allocator; the allocator
                    // preserves the leading `min(old, new)` bytes, which cover
                    // the live elements since `len <= capacity`.
                    let moved = unsafe { self.alloc.reallocate(Some(old.origin), old.bytes, bytes) }
                        .ok_or(BufferError::AllocationFailed { bytes })?;
                    trace!("buffer storage resized to {capacity} elements ({bytes} bytes)");
                    self.storage = Storage::Owned(Allocation {
                        ptr: moved.cast(),
                        capacity,
                        origin: moved,
                        bytes,
                    });
                    return Ok(());
                }
            }
        }

        let fresh = self.allocate_storage(capacity)?;
        // SAFETY: the new span holds at least `len` elements and is disjoint
        // from the current storage.
        unsafe { ptr::copy_nonoverlapping(self.as_ptr(), fresh.ptr.as_ptr(), self.len) };
        trace!(
            "buffer storage moved to {capacity} elements ({} bytes)",
            fresh.bytes
        );
        if let Storage::Owned(old) = mem::replace(&mut self.storage, Storage::Owned(fresh)) {
            self.release(old);
        }
        Ok(())
    }

    /// Drop `[n, len)` from owned storage and shorten the buffer.
    fn truncate(&mut self, n: usize) {
        if n >= self.len {
            return;
        }
        let tail = self.len - n;
        self.len = n;
        if let Storage::Owned(allocation) = &self.storage {
            // SAFETY: `[n, n + tail)` were live and are no longer reachable.
            unsafe {
                ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                    allocation.ptr.as_ptr().add(n),
                    tail,
                ));
            }
        }
    }

    // ── resizing ─────────────────────────────────────────────────

    /// Resize to `n` elements, filling new slots with `T::default()`.
    ///
    /// Reserved capacity is kept when shrinking. `resize(0)` is
    /// [`clear`](Self::clear).
    pub fn resize(&mut self, n: usize) -> Result<(), BufferError>
    where
        T: Default,
    {
        self.resize_impl(n, CapacityPolicy::Retain, T::default)
    }

    /// Resize to `n` elements under an explicit capacity policy.
    ///
    /// With [`CapacityPolicy::Downsize`], a shrink whose reallocation fails
    /// still succeeds and keeps the larger storage.
    pub fn resize_to(&mut self, n: usize, policy: CapacityPolicy) -> Result<(), BufferError>
    where
        T: Default,
    {
        self.resize_impl(n, policy, T::default)
    }

    /// Resize to `n` elements, filling new slots by calling `f`.
    pub fn resize_with<F>(&mut self, n: usize, f: F) -> Result<(), BufferError>
    where
        F: FnMut() -> T,
    {
        self.resize_impl(n, CapacityPolicy::Retain, f)
    }

    fn resize_impl<F>(&mut self, n: usize, policy: CapacityPolicy, mut f: F) -> Result<(), BufferError>
    where
        F: FnMut() -> T,
    {
        if n == 0 {
            self.clear();
            return Ok(());
        }
        let target = self.chunked(n)?;
        self.truncate(n);

        let grow = if self.storage.is_borrowed() {
            n > self.len
        } else {
            target > self.reserved()
        };
        let shrink = policy == CapacityPolicy::Downsize
            && !self.storage.is_borrowed()
            && target < self.reserved();
        if grow {
            self.reallocate(target)?;
        } else if shrink && self.reallocate(target).is_err() {
            // Elements past `n` are already dropped; the larger storage
            // still holds the rest.
            debug!(
                "buffer downsize to {target} elements failed; keeping {}",
                self.reserved()
            );
        }

        if n > self.len {
            let base = self.writable_ptr();
            while self.len < n {
                // SAFETY: `len < n <= capacity`; the slot is uninitialized.
                unsafe { base.as_ptr().add(self.len).write(f()) };
                self.len += 1;
            }
        }
        Ok(())
    }

    /// Ensure room for at least `n` elements without changing the length.
    ///
    /// A borrowed buffer asked for more than its length is copied into owned
    /// storage.
    pub fn reserve(&mut self, n: usize) -> Result<(), BufferError> {
        if n <= self.reserved() {
            return Ok(());
        }
        let target = self.chunked(n)?;
        self.reallocate(target)
    }

    /// Reallocate owned storage to the smallest chunk multiple holding the
    /// current elements.
    pub fn shrink_to_fit(&mut self) -> Result<(), BufferError> {
        if self.storage.is_borrowed() {
            return Ok(());
        }
        if self.len == 0 {
            self.clear();
            return Ok(());
        }
        let target = self.chunked(self.len)?;
        if target < self.reserved() {
            self.reallocate(target)?;
        }
        Ok(())
    }

    /// Drop every element and release owned storage.
    ///
    /// A borrowed buffer detaches from its view and becomes empty.
    pub fn clear(&mut self) {
        self.truncate(0);
        let empty = Storage::empty(self.alignment());
        if let Storage::Owned(old) = mem::replace(&mut self.storage, empty) {
            self.release(old);
        }
    }

    // ── element operations ───────────────────────────────────────

    /// Append `value`, growing by one chunk when full.
    ///
    /// On failure `value` is dropped and the buffer is unchanged.
    pub fn push(&mut self, value: T) -> Result<(), BufferError> {
        if self.len == self.reserved() {
            let needed = self
                .len
                .checked_add(1)
                .ok_or(BufferError::CapacityOverflow { elements: self.len })?;
            let target = self.chunked(needed)?;
            self.reallocate(target)?;
        }
        let base = self.writable_ptr();
        // SAFETY: `len < capacity`; the slot is uninitialized.
        unsafe { base.as_ptr().add(self.len).write(value) };
        self.len += 1;
        Ok(())
    }

    /// Move the last element out. Storage is never shrunk.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the slot was live and is now past the end.
        Some(unsafe { ptr::read(self.as_ptr().add(self.len)) })
    }

    /// Remove the element at `index` in O(1) by moving the last element into
    /// its slot. Order is not preserved.
    ///
    /// # Panics
    ///
    /// If `index >= len`, or the storage is a read-only view.
    pub fn remove(&mut self, index: usize) -> T {
        let len = self.len;
        assert!(
            index < len,
            "remove index {index} out of range for buffer of length {len}"
        );
        let base = self.writable_ptr().as_ptr();
        let last = len - 1;
        // SAFETY: `index` and `last` are live slots; after the read the hole
        // at `index` is refilled by a bitwise move of `last`, which then
        // falls past the end.
        unsafe {
            let removed = ptr::read(base.add(index));
            if index != last {
                ptr::copy_nonoverlapping(base.add(last), base.add(index), 1);
            }
            self.len = last;
            removed
        }
    }

    /// Remove the first element equal to `value`. See [`remove`](Self::remove).
    pub fn remove_item(&mut self, value: &T) -> Option<T>
    where
        T: PartialEq,
    {
        let index = self.as_slice().iter().position(|v| v == value)?;
        Some(self.remove(index))
    }

    /// Remove the element `ptr` points at. See [`remove`](Self::remove).
    ///
    /// # Panics
    ///
    /// If `ptr` does not address a live element of this buffer.
    pub fn remove_ptr(&mut self, ptr: *const T) -> T {
        let stride = mem::size_of::<T>().max(1);
        let offset = (ptr as usize).wrapping_sub(self.as_ptr() as usize);
        assert!(
            offset % stride == 0 && offset / stride < self.len,
            "pointer {ptr:p} does not address an element of this buffer"
        );
        self.remove(offset / stride)
    }

    /// Replace the contents with clones of `src` in freshly allocated storage.
    ///
    /// The old storage is released only after the copy succeeds.
    pub fn set(&mut self, src: &[T]) -> Result<(), BufferError>
    where
        T: Clone,
    {
        let target = self.chunked(src.len())?;
        let fresh = self.allocate_storage(target)?;
        for (i, value) in src.iter().enumerate() {
            // SAFETY: `i < src.len() <= capacity` of the fresh span.
            unsafe { fresh.ptr.as_ptr().add(i).write(value.clone()) };
        }
        self.clear();
        self.storage = Storage::Owned(fresh);
        self.len = src.len();
        Ok(())
    }

    /// Append clones of every element of `src`.
    pub fn extend_from_slice(&mut self, src: &[T]) -> Result<(), BufferError>
    where
        T: Clone,
    {
        if src.is_empty() {
            return Ok(());
        }
        let needed = self
            .len
            .checked_add(src.len())
            .ok_or(BufferError::CapacityOverflow { elements: usize::MAX })?;
        self.reserve(needed)?;
        let base = self.writable_ptr();
        for value in src {
            // SAFETY: `len < needed <= capacity`; the slot is uninitialized.
            unsafe { base.as_ptr().add(self.len).write(value.clone()) };
            self.len += 1;
        }
        Ok(())
    }

    // ── ownership transfer ───────────────────────────────────────

    /// Stop owning the current storage without releasing it.
    ///
    /// The buffer keeps a writable borrowed view of the same elements. The
    /// allocation is leaked: neither the elements nor the memory are ever
    /// returned to the allocator. Has no effect on borrowed storage.
    pub fn disown(&mut self) {
        if let Storage::Owned(allocation) = &self.storage {
            trace!(
                "buffer disowned {} bytes holding {} elements",
                allocation.bytes,
                self.len
            );
            self.storage = Storage::Borrowed {
                ptr: allocation.ptr,
                writable: true,
            };
        }
    }

    /// Move the storage and elements into a new buffer, leaving `self` as an
    /// empty borrowed shell.
    ///
    /// The returned buffer owns whatever `self` owned. `self` reports
    /// [`injected`](Self::injected) until it is refilled by `set`, `resize`,
    /// `push`, or `inject`.
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        let shell = Storage::shell(self.alignment());
        let storage = mem::replace(&mut self.storage, shell);
        let len = mem::replace(&mut self.len, 0);
        Self {
            storage,
            len,
            config: self.config,
            alloc: self.alloc.clone(),
            _marker: PhantomData,
        }
    }
}

impl<'a, T: Copy, A: RawAllocator> Buffer<'a, T, A> {
    /// Release any owned storage and view `external` as a writable borrowed
    /// buffer.
    ///
    /// The memory is never released by the buffer. Growing past
    /// `external.len()` copies the elements into owned storage.
    pub fn inject(&mut self, external: &'a mut [T]) {
        self.clear();
        self.len = external.len();
        self.storage = Storage::Borrowed {
            ptr: NonNull::from(external).cast(),
            writable: true,
        };
    }

    /// Release any owned storage and view `external` as a read-only borrowed
    /// buffer.
    ///
    /// Any in-place mutation through the buffer panics. Growing copies the
    /// elements into owned, writable storage.
    pub fn inject_const(&mut self, external: &'a [T]) {
        self.clear();
        self.len = external.len();
        self.storage = Storage::Borrowed {
            ptr: NonNull::from(external).cast(),
            writable: false,
        };
    }
}

impl<T, A: RawAllocator> Drop for Buffer<'_, T, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T, A: RawAllocator> Deref for Buffer<'_, T, A> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: RawAllocator> DerefMut for Buffer<'_, T, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<'b, T, A: RawAllocator> IntoIterator for &'b Buffer<'_, T, A> {
    type Item = &'b T;
    type IntoIter = slice::Iter<'b, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'b, T, A: RawAllocator> IntoIterator for &'b mut Buffer<'_, T, A> {
    type Item = &'b mut T;
    type IntoIter = slice::IterMut<'b, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T: fmt::Debug, A: RawAllocator> fmt::Debug for Buffer<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

fn effective_alignment<T>(config: &BufferConfig) -> usize {
    config.alignment.max(mem::align_of::<T>())
}
