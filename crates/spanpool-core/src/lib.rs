//! Shared primitives for the spanpool allocators.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! pieces both the region allocator and the growable buffer build on:
//!
//! - [`align`]: machine-word alignment arithmetic.
//! - [`alloc`]: the [`RawAllocator`] capability trait and the default
//!   [`HeapAllocator`].
//! - [`sync`]: the spin lock guarding allocator state.
//!
//! The only `unsafe` in this crate lives in [`alloc`], where raw heap
//! memory crosses the capability boundary.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod align;
pub mod alloc;
pub mod sync;

pub use align::{MIN_ALIGN, WORD};
pub use alloc::{HeapAllocator, RawAllocator};
pub use sync::SpinLock;
