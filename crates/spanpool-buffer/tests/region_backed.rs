//! Buffers drawing their storage from region allocators.

use std::sync::Arc;
use std::thread;

use spanpool_buffer::{Buffer, BufferConfig, BufferError, CapacityPolicy};
use spanpool_region::RegionAllocator;
use spanpool_test_utils::{DropCounter, TrackingAllocator};

#[test]
fn buffer_over_borrowed_span() {
    let mut memory = vec![0u8; 8 * 1024];
    let region = RegionAllocator::from_slice(&mut memory);
    {
        let mut buf = Buffer::new_in(&region);
        for i in 0..100u64 {
            buf.push(i).unwrap();
        }
        assert_eq!(buf.iter().sum::<u64>(), 4950);
        assert!(region.contains(std::ptr::NonNull::new(buf.as_mut_ptr().cast()).unwrap()));
    }
    assert_eq!(region.allocated(), 0);
}

#[test]
fn aligned_buffer_over_region() {
    let region = RegionAllocator::with_capacity(16 * 1024);
    let config = BufferConfig::new().with_chunk(5).with_alignment(128);
    let mut buf: Buffer<'_, u8, _> = Buffer::with_config_in(config, &region).unwrap();
    for i in 0..200u8 {
        buf.push(i).unwrap();
        assert_eq!(buf.as_ptr() as usize % 128, 0);
    }
    buf.resize_to(7, CapacityPolicy::Downsize).unwrap();
    assert_eq!(buf.capacity(), 10);
    assert_eq!(buf.as_ptr() as usize % 128, 0);
    assert_eq!(&buf[..], &[0, 1, 2, 3, 4, 5, 6]);
    drop(buf);
    assert_eq!(region.allocated(), 0);
}

#[test]
fn exhausted_region_keeps_buffer_contents() {
    let region = RegionAllocator::with_capacity(512);
    let config = BufferConfig::new().with_chunk(8);
    let mut buf = Buffer::with_config_in(config, &region).unwrap();
    let mut pushed = 0u32;
    let err = loop {
        match buf.push(pushed) {
            Ok(()) => pushed += 1,
            Err(err) => break err,
        }
    };
    assert!(matches!(err, BufferError::AllocationFailed { .. }));
    assert_eq!(buf.len(), pushed as usize);
    assert!(buf.iter().copied().eq(0..pushed));
    buf.clear();
    assert_eq!(region.allocated(), 0);
}

#[test]
fn take_moves_region_storage_between_buffers() {
    let region = RegionAllocator::with_capacity(4096);
    let mut source = Buffer::new_in(&region);
    source.extend_from_slice(&b"hello"[..]).unwrap();
    let held = region.allocated();

    let dest = source.take();
    assert!(source.injected());
    assert_eq!(&dest[..], b"hello");
    assert_eq!(region.allocated(), held);

    drop(source);
    assert_eq!(region.allocated(), held);
    drop(dest);
    assert_eq!(region.allocated(), 0);
}

#[test]
fn drops_run_once_per_element_across_growth() {
    let region = RegionAllocator::with_capacity(16 * 1024);
    let drops = DropCounter::new();
    {
        let mut buf = Buffer::with_config_in(BufferConfig::new().with_chunk(3), &region).unwrap();
        for _ in 0..50 {
            buf.push(drops.token()).unwrap();
        }
        buf.resize_with(20, || drops.token()).unwrap();
        assert_eq!(drops.dropped(), 30);
        drop(buf.remove(5));
        assert_eq!(drops.dropped(), 31);
    }
    assert_eq!(drops.dropped(), 50);
    assert_eq!(region.allocated(), 0);
}

#[test]
fn tracking_over_region_counts_bytes() {
    let region = RegionAllocator::with_capacity(8192);
    let tracker = TrackingAllocator::wrap(&region);
    {
        let mut buf: Buffer<'_, u32, _> = Buffer::new_in(&tracker);
        buf.resize(100).unwrap();
        assert_eq!(tracker.live_bytes(), 112 * 4);
        assert!(region.allocated() > tracker.live_bytes());
    }
    assert_eq!(tracker.live_bytes(), 0);
    assert_eq!(region.allocated(), 0);
}

#[test]
fn buffers_on_threads_share_a_region() {
    let region = Arc::new(RegionAllocator::with_capacity(1024 * 1024));
    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let region = Arc::clone(&region);
            thread::spawn(move || {
                let mut buf = Buffer::new_in(Arc::clone(&region));
                for i in 0..500 {
                    buf.push(t * 1000 + i).unwrap();
                }
                buf.iter().copied().eq((0..500).map(|i| t * 1000 + i))
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(region.allocated(), 0);
}

#[test]
fn growth_into_split_free_runs_needs_a_merge() {
    use spanpool_region::Block;

    // Two chunks of eight `u32`s fill the region exactly.
    let chunk_bytes = 8 * std::mem::size_of::<u32>();
    let block = Block::size_for(chunk_bytes).unwrap();
    let region = RegionAllocator::with_capacity(2 * block);
    let config = BufferConfig::new().with_chunk(8);

    let mut a: Buffer<'_, u32, _> = Buffer::with_config_in(config, &region).unwrap();
    let mut b: Buffer<'_, u32, _> = Buffer::with_config_in(config, &region).unwrap();
    a.resize(8).unwrap();
    b.resize(8).unwrap();
    assert_eq!(region.free(), 0);

    b.clear();
    a.clear();
    assert_eq!(region.allocated(), 0);

    // Sixteen elements fit in the combined space but not in either run.
    let err = a.resize(16).unwrap_err();
    assert!(matches!(err, BufferError::AllocationFailed { .. }));
    assert!(a.is_empty());

    assert_eq!(region.merge_free_runs(), 1);
    a.resize(16).unwrap();
    assert_eq!(a.len(), 16);
    drop(a);
    drop(b);
    assert_eq!(region.allocated(), 0);
}
