//! Seeded workloads for benchmarking and stress-testing spanpool.
//!
//! - [`churn_ops`]: a deterministic interleaving of allocations and frees
//! - [`run_region_churn`]: replay a workload against a [`RegionAllocator`]
//! - [`fill_buffer`]: push a run of samples into a [`Buffer`]

#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::ptr::NonNull;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spanpool_buffer::{Buffer, BufferError};
use spanpool_core::RawAllocator;
use spanpool_region::RegionAllocator;

/// One step of a churn workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChurnOp {
    /// Request `bytes` bytes.
    Allocate {
        /// Requested size.
        bytes: usize,
    },
    /// Free the live allocation at `slot` in allocation order.
    Free {
        /// Index into the live set; always in range when replayed in order.
        slot: usize,
    },
}

/// Generate `count` churn operations from `seed`.
///
/// Allocation sizes are uniform in `1..=max_bytes`. The live set never
/// exceeds `max_live` entries, and a free is only emitted while something is
/// live, assuming every allocation succeeds.
pub fn churn_ops(seed: u64, count: usize, max_bytes: usize, max_live: usize) -> Vec<ChurnOp> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut live = 0usize;
    let mut ops = Vec::with_capacity(count);
    for _ in 0..count {
        let allocate = live == 0 || (live < max_live && rng.random_bool(0.55));
        if allocate {
            ops.push(ChurnOp::Allocate {
                bytes: rng.random_range(1..=max_bytes.max(1)),
            });
            live += 1;
        } else {
            ops.push(ChurnOp::Free {
                slot: rng.random_range(0..live),
            });
            live -= 1;
        }
    }
    ops
}

/// Outcome of replaying a churn workload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChurnReport {
    /// Allocations that returned `None`.
    pub failures: usize,
    /// Highest `allocated()` observed during the run.
    pub peak_allocated: usize,
    /// Allocations still live when the workload ended.
    pub live_at_end: usize,
}

/// Replay `ops` against `region`, then free everything still live.
///
/// A failed allocation is counted and the matching later free is skipped by
/// clamping the slot to the live set.
pub fn run_region_churn(region: &RegionAllocator<'_>, ops: &[ChurnOp]) -> ChurnReport {
    let mut live: Vec<NonNull<u8>> = Vec::new();
    let mut report = ChurnReport::default();
    for op in ops {
        match *op {
            ChurnOp::Allocate { bytes } => match region.allocate(bytes) {
                Some(ptr) => live.push(ptr),
                None => report.failures += 1,
            },
            ChurnOp::Free { slot } => {
                if live.is_empty() {
                    continue;
                }
                let ptr = live.swap_remove(slot % live.len());
                region_free(region, ptr);
            }
        }
        report.peak_allocated = report.peak_allocated.max(region.allocated());
    }
    report.live_at_end = live.len();
    for ptr in live {
        region_free(region, ptr);
    }
    report
}

#[allow(unsafe_code)]
fn region_free(region: &RegionAllocator<'_>, ptr: NonNull<u8>) {
    // SAFETY: `ptr` came from `region.allocate` and is released once.
    unsafe { region.deallocate(ptr) }
}

/// Push `count` samples into `buffer`.
pub fn fill_buffer<A: RawAllocator>(
    buffer: &mut Buffer<'_, f32, A>,
    count: usize,
) -> Result<(), BufferError> {
    for i in 0..count {
        buffer.push(i as f32)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn churn_is_deterministic() {
        assert_eq!(churn_ops(42, 200, 64, 16), churn_ops(42, 200, 64, 16));
        assert_ne!(churn_ops(42, 200, 64, 16), churn_ops(43, 200, 64, 16));
    }

    #[test]
    fn churn_respects_live_bound() {
        let mut live = 0usize;
        for op in churn_ops(7, 1000, 32, 8) {
            match op {
                ChurnOp::Allocate { bytes } => {
                    assert!((1..=32).contains(&bytes));
                    live += 1;
                }
                ChurnOp::Free { slot } => {
                    assert!(slot < live);
                    live -= 1;
                }
            }
            assert!(live <= 8);
        }
    }

    #[test]
    fn replay_returns_every_byte() {
        let region = RegionAllocator::with_capacity(64 * 1024);
        let report = run_region_churn(&region, &churn_ops(1, 500, 128, 32));
        assert_eq!(report.failures, 0);
        assert!(report.peak_allocated > 0);
        assert_eq!(region.allocated(), 0);
    }

    #[test]
    fn fill_buffer_pushes_samples() {
        let mut buffer: Buffer<'_, f32> = Buffer::new();
        fill_buffer(&mut buffer, 100).unwrap();
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer[99], 99.0);
    }
}
