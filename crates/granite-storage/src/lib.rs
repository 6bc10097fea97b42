//! # granite-storage
//!
//! Buffer pool substrate for GraniteDB.
//!
//! This crate implements the three subsystems that mediate all access
//! between fixed-size disk pages and in-memory frames:
//!
//! - An extendible hash table used as the page directory (and reusable as a
//!   general concurrent map)
//! - An LRU-K replacer that selects which unpinned frame to evict
//! - A buffer pool manager that orchestrates pinning, I/O, and eviction
//!   over a fixed pool of page-sized frames
//!
//! Everything above this layer (indexes, executors, recovery) goes through
//! [`buffer::BufferPoolManager`] to touch a page.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool manager, frames, and replacement policy
pub mod buffer;

/// Concurrent containers
pub mod container;

/// Disk manager abstraction and implementations
pub mod disk;

/// Write-ahead-log hook consumed by the buffer pool
pub mod wal;
