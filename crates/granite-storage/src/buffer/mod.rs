//! Buffer pool manager for GraniteDB.
//!
//! The buffer pool manages a fixed pool of in-memory page frames,
//! mediating all access between disk pages and the rest of the engine:
//!
//! - **Pin/Unpin**: reference counting keeps resident pages safe from
//!   recycling while callers use them
//! - **Dirty tracking**: modified pages are written back before their
//!   frame is reused
//! - **Eviction**: an LRU-K replacer picks which unpinned frame to give up
//! - **Page directory**: an extendible hash table maps resident page ids
//!   to frames
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   BufferPoolManager                        │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │   Page table: ExtendibleHashTable<PageId, FrameId>   │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                           │                                │
//! │                           ▼                                │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │                  Frame array                         │  │
//! │  │  ┌────────┐ ┌────────┐ ┌────────┐     ┌────────┐     │  │
//! │  │  │ Page 0 │ │ Page 1 │ │ Page 2 │ ... │ Page N │     │  │
//! │  │  │ pid    │ │ pid    │ │ pid    │     │ pid    │     │  │
//! │  │  │ pins   │ │ pins   │ │ pins   │     │ pins   │     │  │
//! │  │  │ dirty  │ │ dirty  │ │ dirty  │     │ dirty  │     │  │
//! │  │  │ data[] │ │ data[] │ │ data[] │     │ data[] │     │  │
//! │  │  └────────┘ └────────┘ └────────┘     └────────┘     │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │             │                          │                   │
//! │             ▼                          ▼                   │
//! │  ┌─────────────────────┐   ┌─────────────────────┐         │
//! │  │   LruKReplacer      │   │    free list        │         │
//! │  │ (victim selection)  │   │ (never-used frames) │         │
//! │  └─────────────────────┘   └─────────────────────┘         │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use granite_storage::buffer::{BufferPoolConfig, BufferPoolManager};
//! use granite_storage::disk::MemoryDiskManager;
//!
//! let config = BufferPoolConfig::new(16);
//! let disk = Arc::new(MemoryDiskManager::new(config.page_size));
//! let pool = BufferPoolManager::new(config, disk).unwrap();
//!
//! let page = pool.new_page().unwrap();
//! let pid = page.page_id();
//! page.write_data()[0] = 42;
//! pool.unpin_page(pid, true);
//!
//! let page = pool.fetch_page(pid).unwrap();
//! assert_eq!(page.read_data()[0], 42);
//! pool.unpin_page(pid, false);
//! ```

mod config;
mod error;
mod frame;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use frame::{FrameId, Page};
pub use pool::BufferPoolManager;
pub use replacer::LruKReplacer;

/// Statistics for buffer pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    /// Total number of page fetches.
    pub fetches: u64,
    /// Number of fetches served from memory.
    pub hits: u64,
    /// Number of fetches that required a disk read.
    pub misses: u64,
    /// Number of pages evicted.
    pub evictions: u64,
    /// Number of page write-backs.
    pub flushes: u64,
    /// Current number of pinned frames.
    pub pinned_frames: usize,
    /// Current number of dirty frames.
    pub dirty_frames: usize,
}

impl BufferPoolStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}
