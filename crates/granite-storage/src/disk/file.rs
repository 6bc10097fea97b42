//! File-backed disk manager.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use granite_common::types::PageId;
use parking_lot::Mutex;

use super::error::{DiskError, DiskResult};
use super::DiskManager;

/// Disk manager backed by a single data file.
///
/// Page `n` occupies the byte range `[n * page_size, (n + 1) * page_size)`.
/// The file is grown lazily by writes; reading a page past the current end
/// of file yields zeroes, which is how freshly allocated pages look before
/// their first write-back.
///
/// The underlying file is guarded by a mutex, so reads and writes are
/// serialized. That matches the buffer pool's own coarse latch; a
/// concurrent I/O scheduler would be an extension, not a requirement.
pub struct FileDiskManager {
    /// The data file, wrapped in a mutex for thread-safe access.
    file: Mutex<File>,
    /// The data file path.
    path: PathBuf,
    /// Page size in bytes.
    page_size: usize,
    /// Next page id to hand out.
    next_page_id: AtomicU64,
}

impl FileDiskManager {
    /// Opens (or creates) the data file at `path`.
    ///
    /// Page id allocation resumes after the highest page the file already
    /// contains.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| DiskError::Open {
                path: path.clone(),
                source,
            })?;

        let len = file.metadata()?.len();
        let next_page_id = len.div_ceil(page_size as u64);

        Ok(Self {
            file: Mutex::new(file),
            path,
            page_size,
            next_page_id: AtomicU64::new(next_page_id),
        })
    }

    /// Returns the data file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Forces all written pages to stable storage.
    pub fn sync(&self) -> DiskResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    fn check_args(&self, page_id: PageId, len: usize) -> DiskResult<u64> {
        if !page_id.is_valid() {
            return Err(DiskError::InvalidPageId { page_id });
        }
        if len != self.page_size {
            return Err(DiskError::BufferSize {
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(page_id.as_u64() * self.page_size as u64)
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        let offset = self.check_args(page_id, buf.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        // Fill from the file until EOF, then zero the tail. A page beyond
        // the end of the file has simply never been written back.
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < buf.len() {
            tracing::debug!(
                page_id = %page_id,
                bytes = filled,
                "short read past end of data file, zero-filling"
            );
            buf[filled..].fill(0);
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        let offset = self.check_args(page_id, data.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    fn allocate_page(&self) -> PageId {
        PageId::new(self.next_page_id.fetch_add(1, Ordering::Relaxed))
    }

    fn deallocate_page(&self, page_id: PageId) {
        // The bytes stay in place; a free-space map on disk would reclaim
        // them. Ids are never reused, so stale content is unreachable.
        tracing::debug!(page_id = %page_id, "deallocated page");
    }
}

impl std::fmt::Debug for FileDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskManager")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .field("next_page_id", &self.next_page_id.load(Ordering::Relaxed))
            .finish()
    }
}
