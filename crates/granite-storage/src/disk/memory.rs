//! In-memory disk manager for testing.
//!
//! Keeps every page image in a map instead of a file, making it ideal for
//! unit tests and simulations: tests can inspect exactly which pages the
//! buffer pool wrote back, without touching the filesystem.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use granite_common::types::PageId;
use parking_lot::Mutex;

use super::error::{DiskError, DiskResult};
use super::DiskManager;

/// Disk manager that stores page images in memory.
pub struct MemoryDiskManager {
    /// Page size in bytes.
    page_size: usize,
    /// Stored page images.
    pages: Mutex<HashMap<PageId, Box<[u8]>>>,
    /// Next page id to hand out.
    next_page_id: AtomicU64,
    /// Number of `write_page` calls observed.
    write_count: AtomicU64,
}

impl MemoryDiskManager {
    /// Creates an empty in-memory disk with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            pages: Mutex::new(HashMap::new()),
            next_page_id: AtomicU64::new(0),
            write_count: AtomicU64::new(0),
        }
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns a copy of the stored image for `page_id`, or `None` if the
    /// page was never written (or was deallocated).
    pub fn page_image(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.pages.lock().get(&page_id).map(|data| data.to_vec())
    }

    /// Returns how many `write_page` calls this disk has observed.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Returns the number of pages currently holding an image.
    pub fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    fn check_args(&self, page_id: PageId, len: usize) -> DiskResult<()> {
        if !page_id.is_valid() {
            return Err(DiskError::InvalidPageId { page_id });
        }
        if len != self.page_size {
            return Err(DiskError::BufferSize {
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(())
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        self.check_args(page_id, buf.len())?;
        match self.pages.lock().get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        self.check_args(page_id, data.len())?;
        self.pages.lock().insert(page_id, data.into());
        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn allocate_page(&self) -> PageId {
        PageId::new(self.next_page_id.fetch_add(1, Ordering::Relaxed))
    }

    fn deallocate_page(&self, page_id: PageId) {
        self.pages.lock().remove(&page_id);
    }
}

impl std::fmt::Debug for MemoryDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDiskManager")
            .field("page_size", &self.page_size)
            .field("pages", &self.pages.lock().len())
            .field("writes", &self.write_count())
            .finish()
    }
}
