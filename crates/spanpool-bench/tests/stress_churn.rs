//! Long seeded churn runs against shared regions and region-backed buffers.

use std::sync::Arc;
use std::thread;

use spanpool_bench::{churn_ops, fill_buffer, run_region_churn};
use spanpool_buffer::{Buffer, BufferConfig};
use spanpool_region::RegionAllocator;

#[test]
fn long_churn_conserves_bytes() {
    let region = RegionAllocator::with_capacity(2 * 1024 * 1024);
    for seed in 0..8 {
        let report = run_region_churn(&region, &churn_ops(seed, 5_000, 512, 64));
        assert_eq!(report.failures, 0, "seed {seed} failed to allocate");
        assert_eq!(region.allocated(), 0, "seed {seed} leaked bytes");
        region.merge_free_runs();
        let stats = region.stats();
        assert_eq!(stats.free_blocks, 1);
        assert_eq!(stats.largest_free_run, region.capacity());
    }
}

#[test]
fn concurrent_churn_conserves_bytes() {
    let region = Arc::new(RegionAllocator::with_capacity(4 * 1024 * 1024));
    let handles: Vec<_> = (0..4u64)
        .map(|seed| {
            let region = Arc::clone(&region);
            thread::spawn(move || run_region_churn(&region, &churn_ops(seed, 2_000, 256, 32)))
        })
        .collect();
    for handle in handles {
        let report = handle.join().unwrap();
        assert_eq!(report.failures, 0);
    }
    assert_eq!(region.allocated(), 0);
}

#[test]
fn buffers_share_one_region() {
    let region = RegionAllocator::with_capacity(1024 * 1024);
    let config = BufferConfig::new().with_chunk(64);
    {
        let mut buffers: Vec<Buffer<'_, f32, _>> = (0..8)
            .map(|_| Buffer::with_config_in(config, &region).unwrap())
            .collect();
        for round in 1..=4 {
            for buf in &mut buffers {
                fill_buffer(buf, 256).unwrap();
                assert_eq!(buf.len(), 256 * round);
            }
        }
        for buf in &buffers {
            assert_eq!(buf[256], 0.0);
            assert_eq!(buf[257], 1.0);
        }
    }
    assert_eq!(region.allocated(), 0);
}
