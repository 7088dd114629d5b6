//! Spanpool: a bounded-latency region allocator and ownership-aware
//! growable buffers.
//!
//! This is the facade crate that re-exports the public API of the spanpool
//! sub-crates. For most users, adding `spanpool` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use spanpool::prelude::*;
//!
//! // Reserve one span up front; nothing below touches the heap again.
//! let region = RegionAllocator::with_capacity(64 * 1024);
//!
//! let config = BufferConfig::new().with_chunk(64).with_alignment(32);
//! let mut samples: Buffer<'_, f32, _> = Buffer::with_config_in(config, &region).unwrap();
//! samples.resize(256).unwrap();
//! samples[0] = 0.5;
//!
//! assert_eq!(samples.capacity(), 256);
//! assert_eq!(samples.as_ptr() as usize % 32, 0);
//! assert!(region.allocated() > 256 * 4);
//!
//! drop(samples);
//! assert_eq!(region.allocated(), 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`primitives`] | `spanpool-core` | Alignment helpers, `RawAllocator`, `HeapAllocator`, spin lock |
//! | [`region`] | `spanpool-region` | `RegionAllocator`, block headers, `RegionStats` |
//! | [`buffer`] | `spanpool-buffer` | `Buffer`, `BufferConfig`, errors |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Shared primitives (`spanpool-core`).
///
/// Implement [`primitives::RawAllocator`] to back buffers with your own memory.
pub use spanpool_core as primitives;

/// First-fit region allocator (`spanpool-region`).
///
/// [`region::RegionAllocator`] serves every request from one span reserved
/// at construction.
pub use spanpool_region as region;

/// Ownership-aware growable buffer (`spanpool-buffer`).
pub use spanpool_buffer as buffer;

/// Common imports for typical spanpool usage.
///
/// ```rust
/// use spanpool::prelude::*;
/// ```
pub mod prelude {
    pub use spanpool_buffer::{Buffer, BufferConfig, BufferError, CapacityPolicy, ConfigError};
    pub use spanpool_core::{HeapAllocator, RawAllocator};
    pub use spanpool_region::{RegionAllocator, RegionStats};
}
