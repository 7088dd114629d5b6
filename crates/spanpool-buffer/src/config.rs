//! Buffer configuration parameters.

use crate::error::ConfigError;

/// Growth and alignment settings for a [`Buffer`](crate::Buffer).
///
/// Validated when the buffer is built; immutable afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferConfig {
    /// Reserved capacity is always a multiple of this many elements.
    ///
    /// Default: 16. Larger chunks trade memory for fewer reallocations.
    pub chunk: usize,

    /// Required byte alignment of the element storage.
    ///
    /// Zero means the element type's natural alignment. Values larger than
    /// the allocator's word alignment are met by over-allocating and
    /// offsetting into the span.
    pub alignment: usize,
}

impl BufferConfig {
    /// Default growth granularity in elements.
    pub const DEFAULT_CHUNK: usize = 16;

    /// Default settings: [`DEFAULT_CHUNK`](Self::DEFAULT_CHUNK), natural alignment.
    pub const fn new() -> Self {
        Self {
            chunk: Self::DEFAULT_CHUNK,
            alignment: 0,
        }
    }

    /// Set the growth granularity.
    pub const fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Set the storage alignment.
    pub const fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Check that the settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk == 0 {
            return Err(ConfigError::ZeroChunk);
        }
        if self.alignment != 0 && !self.alignment.is_power_of_two() {
            return Err(ConfigError::AlignmentNotPowerOfTwo {
                alignment: self.alignment,
            });
        }
        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self::new()
    }
}
