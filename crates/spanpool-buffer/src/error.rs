//! Buffer error types.
//!
//! Only exhaustion and invalid configuration are reported as values.
//! Misuse (out-of-range indices, writes through a read-only view) panics at
//! the point of detection.

use thiserror::Error;

/// Errors from operations that may need new storage.
///
/// Every operation returning this error leaves the buffer valid and its
/// storage untouched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BufferError {
    /// The allocator could not supply the requested span.
    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed {
        /// Number of bytes requested from the allocator.
        bytes: usize,
    },
    /// The requested element count does not fit in the address space.
    #[error("capacity overflow: {elements} elements cannot be addressed")]
    CapacityOverflow {
        /// Number of elements requested.
        elements: usize,
    },
}

/// Errors from [`BufferConfig::validate`](crate::BufferConfig::validate).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Growth granularity must be at least one element.
    #[error("chunk granularity must be at least one element")]
    ZeroChunk,
    /// Alignment must be zero (natural) or a power of two.
    #[error("alignment {alignment} is not a power of two")]
    AlignmentNotPowerOfTwo {
        /// The rejected alignment.
        alignment: usize,
    },
}
