//! First-fit region allocator over a single pre-reserved span.
//!
//! A [`RegionAllocator`] carves sub-allocations out of one contiguous span
//! supplied at construction. It never calls back into the general-purpose
//! heap afterwards, which keeps allocation latency bounded by a linear walk
//! of the span's block list.
//!
//! # Layout
//!
//! ```text
//!   span (word aligned, word multiple)
//!   ┌─────┬──────────┬─────┬──────┬─────┬──────────────────────────┐
//!   │ len │ payload  │  0  │ run  │ len │ payload                  │ ...
//!   └─────┴──────────┴─────┴──────┴─────┴──────────────────────────┘
//!   ◄── allocated ──►◄─── free ──►◄──────── allocated ─────────────►
//! ```
//!
//! Every block starts with a one-word header ([`Block`]). Blocks tile the
//! span with no gaps, so the allocator finds the next header by adding the
//! current block's extent.
//!
//! # Policies
//!
//! - **First fit:** the scan accepts the first free run large enough.
//! - **No slivers:** a leftover too small to host a header stays inside the
//!   allocated block.
//! - **No merge on free:** `deallocate` never joins neighbouring free runs.
//!   [`RegionAllocator::merge_free_runs`] does so on request.
//! - **Fail soft on exhaustion, hard on corruption:** running out of space
//!   returns `None`; a malformed header or a foreign pointer panics.
//!
//! # Module structure
//!
//! ```text
//!   region   - RegionAllocator (locking, pointers, backing span)
//!   arena    - first-fit algorithm over byte offsets (internal)
//!   block    - header encoding
//!   stats    - RegionStats telemetry
//!   raw      - bounds-checked word access (internal, the only unsafe memory access)
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

mod arena;
pub mod block;
mod raw;
pub mod region;
pub mod stats;

pub use block::Block;
pub use region::RegionAllocator;
pub use stats::RegionStats;
