//! Fragmentation telemetry for a region.

use crate::block::Block;

/// A point-in-time summary of a region's block list.
///
/// Produced by [`RegionAllocator::stats`](crate::RegionAllocator::stats),
/// which walks every block under the region's lock. All byte counts include
/// block headers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegionStats {
    /// Usable bytes in the span.
    pub capacity: usize,
    /// Bytes held by allocated blocks.
    pub allocated: usize,
    /// Bytes held by free blocks.
    pub free: usize,
    /// Number of allocated blocks.
    pub allocated_blocks: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Extent of the largest single free block.
    pub largest_free_run: usize,
}

impl RegionStats {
    /// Largest request that can currently succeed, in payload bytes.
    pub fn largest_allocation(&self) -> usize {
        self.largest_free_run.saturating_sub(Block::HEADER)
    }

    /// Fraction of free bytes that sit outside the largest free run.
    ///
    /// Zero when all free space is contiguous; approaches one as free space
    /// splinters into many small runs.
    pub fn fragmentation(&self) -> f64 {
        if self.free == 0 {
            return 0.0;
        }
        1.0 - self.largest_free_run as f64 / self.free as f64
    }
}
