//! End-to-end buffer pool scenarios.
//!
//! These tests drive the pool, the page directory, the replacer, and a
//! disk manager together, the way index and executor code will.

use std::sync::Arc;

use granite_common::types::PageId;
use granite_storage::buffer::{BufferError, BufferPoolConfig, BufferPoolManager};
use granite_storage::disk::{DiskManager, FileDiskManager, MemoryDiskManager};

fn memory_pool(pool_size: usize) -> (BufferPoolManager, Arc<MemoryDiskManager>) {
    let config = BufferPoolConfig::new(pool_size);
    let disk = Arc::new(MemoryDiskManager::new(config.page_size));
    let pool = BufferPoolManager::new(config, Arc::clone(&disk) as Arc<dyn DiskManager>).unwrap();
    (pool, disk)
}

#[test]
fn round_trip_survives_eviction_pressure() {
    // Far more pages than frames: most round trips go through eviction.
    let (pool, _disk) = memory_pool(4);

    let mut pids = Vec::new();
    for i in 0..16u64 {
        let page = pool.new_page().unwrap();
        let pid = page.page_id();
        page.write_data()[..8].copy_from_slice(&i.to_be_bytes());
        assert!(pool.unpin_page(pid, true));
        pids.push((pid, i));
    }

    for (pid, i) in pids {
        let page = pool.fetch_page(pid).unwrap();
        assert_eq!(&page.read_data()[..8], &i.to_be_bytes());
        assert!(pool.unpin_page(pid, false));
    }
}

#[test]
fn pool_exhaustion_and_frame_recycling() {
    let (pool, _disk) = memory_pool(3);

    let p0 = pool.new_page().unwrap().page_id();
    let p1 = pool.new_page().unwrap().page_id();
    let p2 = pool.new_page().unwrap().page_id();

    // Every frame is pinned: the fourth page cannot be created.
    let err = pool.new_page().unwrap_err();
    assert!(matches!(err, BufferError::NoFreeFrames));

    // Releasing one pin recycles exactly that frame.
    assert!(pool.unpin_page(p0, false));
    let p3 = pool.new_page().unwrap().page_id();

    assert!(!pool.contains(p0));
    assert!(pool.contains(p1));
    assert!(pool.contains(p2));
    assert!(pool.contains(p3));
}

#[test]
fn dirty_page_written_back_on_eviction() {
    let (pool, disk) = memory_pool(1);

    let page = pool.new_page().unwrap();
    let p0 = page.page_id();
    page.write_data()[0] = b'A';
    assert!(pool.unpin_page(p0, true));

    // Creating another page evicts p0; its bytes must reach the disk.
    let p1 = pool.new_page().unwrap().page_id();
    let image = disk.page_image(p0).expect("eviction must write p0 back");
    assert_eq!(image[0], b'A');

    // The miss path reads the written bytes back.
    assert!(pool.unpin_page(p1, false));
    let page = pool.fetch_page(p0).unwrap();
    assert_eq!(page.read_data()[0], b'A');
    assert!(!page.is_dirty());
}

#[test]
fn flush_makes_bytes_durable_and_clean() {
    let (pool, disk) = memory_pool(4);

    let page = pool.new_page().unwrap();
    let pid = page.page_id();
    page.write_data()[..5].copy_from_slice(b"fresh");
    assert!(pool.unpin_page(pid, true));
    assert!(page.is_dirty());

    pool.flush_page(pid).unwrap();
    assert!(!page.is_dirty());
    assert_eq!(&disk.page_image(pid).unwrap()[..5], b"fresh");
}

#[test]
fn delete_pinned_page_is_refused() {
    let (pool, disk) = memory_pool(4);

    let pid = pool.new_page().unwrap().page_id();
    assert!(matches!(
        pool.delete_page(pid),
        Err(BufferError::PagePinned { .. })
    ));

    assert!(pool.unpin_page(pid, false));
    pool.delete_page(pid).unwrap();
    assert!(!pool.contains(pid));

    // Fetching the deleted page loads whatever the disk has for that id -
    // for the memory disk, a zeroed image.
    assert_eq!(disk.page_image(pid), None);
    let page = pool.fetch_page(pid).unwrap();
    assert!(page.read_data().iter().all(|&b| b == 0));
}

#[test]
fn resident_page_maps_to_exactly_one_frame() {
    let (pool, _disk) = memory_pool(4);

    let first = pool.new_page().unwrap();
    let pid = first.page_id();
    let second = pool.fetch_page(pid).unwrap();

    // Both handles see the same frame.
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.frame_id(), second.frame_id());
    assert_eq!(first.pin_count(), 2);

    assert!(pool.unpin_page(pid, false));
    assert!(pool.unpin_page(pid, false));
}

#[test]
fn pinned_pages_are_never_evicted() {
    let (pool, _disk) = memory_pool(2);

    let hot = pool.new_page().unwrap();
    let hot_pid = hot.page_id();
    hot.write_data()[0] = 1;

    // Cycle many pages through the other frame; the pinned page stays.
    let filler = pool.new_page().unwrap().page_id();
    assert!(pool.unpin_page(filler, false));
    for _ in 0..8 {
        let page = pool.new_page().unwrap();
        assert!(pool.unpin_page(page.page_id(), false));
    }

    assert!(pool.contains(hot_pid));
    assert_eq!(hot.read_data()[0], 1);
    assert!(pool.unpin_page(hot_pid, false));
}

#[test]
fn file_backed_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("granite.db");
    let config = BufferPoolConfig::new(4);
    let page_size = config.page_size;

    let mut pids = Vec::new();
    {
        let disk = Arc::new(FileDiskManager::open(&path, page_size).unwrap());
        let pool = BufferPoolManager::new(config.clone(), disk.clone() as Arc<dyn DiskManager>)
            .unwrap();

        for i in 0..8u8 {
            let page = pool.new_page().unwrap();
            page.write_data().fill(i);
            pids.push(page.page_id());
            assert!(pool.unpin_page(page.page_id(), true));
        }
        pool.flush_all_pages().unwrap();
        disk.sync().unwrap();
    }

    // A fresh pool over the same file sees every page.
    let disk = Arc::new(FileDiskManager::open(&path, page_size).unwrap());
    let pool = BufferPoolManager::new(config, disk as Arc<dyn DiskManager>).unwrap();
    for (i, pid) in pids.into_iter().enumerate() {
        let page = pool.fetch_page(pid).unwrap();
        assert!(page.read_data().iter().all(|&b| b == i as u8));
        assert!(pool.unpin_page(pid, false));
    }
}

#[test]
fn concurrent_fetch_and_unpin() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let (pool, _disk) = memory_pool(8);
    let pool = Arc::new(pool);

    // Seed pages whose first byte encodes their id.
    let mut pids: Vec<PageId> = Vec::new();
    for i in 0..32u8 {
        let page = pool.new_page().unwrap();
        page.write_data()[0] = i;
        pids.push(page.page_id());
        assert!(pool.unpin_page(page.page_id(), true));
    }
    let pids = Arc::new(pids);

    let mut handles = Vec::new();
    for seed in 0..4u64 {
        let pool = Arc::clone(&pool);
        let pids = Arc::clone(&pids);
        handles.push(std::thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            for _ in 0..256 {
                let idx = rng.gen_range(0..pids.len());
                let page = pool.fetch_page(pids[idx]).unwrap();
                assert_eq!(page.read_data()[0], idx as u8);
                assert!(pool.unpin_page(pids[idx], false));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Every pin was paid back.
    assert_eq!(pool.stats().pinned_frames, 0);
}
