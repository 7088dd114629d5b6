//! Threads sharing one region through `&` and `Arc`.

use std::ptr::NonNull;
use std::sync::Arc;
use std::thread;

use spanpool_region::RegionAllocator;

/// Each thread fills its allocations with its own tag and checks them
/// before freeing, so overlapping blocks would show up as foreign bytes.
fn tagged_round(region: &RegionAllocator<'_>, tag: u8, rounds: usize) {
    let mut held: Vec<(NonNull<u8>, usize)> = Vec::new();
    for i in 0..rounds {
        let bytes = 8 + (i * 13 + tag as usize) % 120;
        if let Some(ptr) = region.allocate(bytes) {
            unsafe { ptr.as_ptr().write_bytes(tag, bytes) };
            held.push((ptr, bytes));
        }
        if held.len() > 16 {
            let (ptr, bytes) = held.remove(0);
            let payload = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), bytes) };
            assert!(payload.iter().all(|&b| b == tag), "block overwritten by another thread");
            unsafe { region.deallocate(ptr) };
        }
    }
    for (ptr, bytes) in held {
        let payload = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), bytes) };
        assert!(payload.iter().all(|&b| b == tag), "block overwritten by another thread");
        unsafe { region.deallocate(ptr) };
    }
}

#[test]
fn scoped_threads_never_share_blocks() {
    let region = RegionAllocator::with_capacity(64 * 1024);
    thread::scope(|s| {
        for tag in 1..=8u8 {
            let region = &region;
            s.spawn(move || tagged_round(region, tag, 2_000));
        }
    });
    assert_eq!(region.allocated(), 0);
}

#[test]
fn arc_shared_region_conserves_bytes() {
    let region = Arc::new(RegionAllocator::with_capacity(64 * 1024));
    let handles: Vec<_> = (1..=4u8)
        .map(|tag| {
            let region = Arc::clone(&region);
            thread::spawn(move || tagged_round(&region, tag, 1_000))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(region.allocated(), 0);
    assert_eq!(region.free(), region.capacity());
}

#[test]
fn borrowed_span_is_shareable() {
    let mut memory = vec![0u8; 16 * 1024];
    let region = RegionAllocator::from_slice(&mut memory);
    thread::scope(|s| {
        for tag in 1..=2u8 {
            let region = &region;
            s.spawn(move || tagged_round(region, tag, 500));
        }
    });
    assert_eq!(region.allocated(), 0);
}

/// Grow and shrink tagged blocks through `reallocate` while other threads
/// merge free runs, checking the preserved prefix after every move.
fn tagged_reallocs(region: &RegionAllocator<'_>, tag: u8, rounds: usize) {
    for i in 0..rounds {
        let Some(ptr) = region.allocate(16) else {
            continue;
        };
        unsafe { ptr.as_ptr().write_bytes(tag, 16) };
        let bytes = 8 + (i * 29 + tag as usize) % 200;
        let ptr = match unsafe { region.reallocate(Some(ptr), bytes) } {
            Some(moved) => {
                let kept = bytes.min(16);
                let prefix = unsafe { std::slice::from_raw_parts(moved.as_ptr(), kept) };
                assert!(prefix.iter().all(|&b| b == tag), "reallocate lost payload bytes");
                unsafe { moved.as_ptr().write_bytes(tag, bytes) };
                moved
            }
            None => ptr,
        };
        unsafe { region.deallocate(ptr) };
        if i % 64 == 0 {
            region.merge_free_runs();
        }
    }
}

#[test]
fn concurrent_reallocate_and_merge_conserve_bytes() {
    let region = RegionAllocator::with_capacity(64 * 1024);
    thread::scope(|s| {
        for tag in 1..=6u8 {
            let region = &region;
            s.spawn(move || tagged_reallocs(region, tag, 2_000));
        }
    });
    assert_eq!(region.allocated(), 0);
    region.merge_free_runs();
    let stats = region.stats();
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.largest_free_run, region.capacity());
}
