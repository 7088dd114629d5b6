//! Ownership-aware growable buffer.
//!
//! A [`Buffer`] is a contiguous array of `T` that either owns its storage,
//! drawn from a [`RawAllocator`](spanpool_core::RawAllocator), or views
//! storage injected from outside. Ownership is tracked explicitly:
//!
//! ```text
//!            new / set / grow                 inject / inject_const
//!   ┌──────────────────────────┐        ┌──────────────────────────┐
//!   │ Owned                    │ disown │ Borrowed                 │
//!   │ released on drop/clear   ├───────►│ never released           │
//!   │ capacity() = reserved    │        │ capacity() = 0           │
//!   └──────────────────────────┘◄───────┴──────────────────────────┘
//!                                 grow (copy into owned storage)
//! ```
//!
//! Capacity grows in multiples of [`BufferConfig::chunk`] elements, and the
//! element storage honours [`BufferConfig::alignment`] even when it exceeds
//! what the allocator guarantees. Allocation failure is reported as a
//! [`BufferError`] and leaves the buffer unchanged. Misuse that would break
//! memory safety, such as an out-of-range `remove` or writing through a
//! read-only view, panics.
//!
//! # Examples
//!
//! ```
//! use spanpool_buffer::{Buffer, BufferConfig};
//!
//! let mut external = [1.0f32, 2.0];
//! let config = BufferConfig::new().with_chunk(8).with_alignment(32);
//! let mut samples: Buffer<'_, f32> = Buffer::with_config(config).unwrap();
//! samples.resize(5).unwrap();
//! assert_eq!(samples.capacity(), 8);
//! assert_eq!(samples.as_ptr() as usize % 32, 0);
//!
//! samples.inject(&mut external);
//! assert!(samples.injected());
//! assert_eq!(samples.capacity(), 0);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod buffer;
pub mod config;
pub mod error;
mod storage;

pub use buffer::{Buffer, CapacityPolicy};
pub use config::BufferConfig;
pub use error::{BufferError, ConfigError};
