//! System-wide constants for GraniteDB.
//!
//! This module defines constants used across the database.

// =============================================================================
// Page and Memory Constants
// =============================================================================

/// Default page size in bytes (4 KB).
///
/// This matches the typical OS page size and keeps a single page read/write
/// a single block-device operation on most hardware.
pub const DEFAULT_PAGE_SIZE: usize = 4 * 1024;

/// Minimum page size in bytes (512 B).
pub const MIN_PAGE_SIZE: usize = 512;

/// Maximum page size in bytes (64 KB).
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

// =============================================================================
// Buffer Pool Constants
// =============================================================================

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 128;

/// Default K for the LRU-K replacement policy.
///
/// K = 2 distinguishes pages touched once (sequential scans) from pages
/// with genuine reuse, which is the classic LRU-2 configuration.
pub const DEFAULT_REPLACER_K: usize = 2;

/// Default number of (key, value) slots per hash-table bucket.
pub const DEFAULT_HASH_BUCKET_SIZE: usize = 4;
