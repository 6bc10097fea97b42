//! Disk manager errors.

use std::io;
use std::path::PathBuf;

use granite_common::types::PageId;
use thiserror::Error;

/// Result type for disk manager operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors that can occur during page I/O.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum DiskError {
    /// Standard I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Failed to open the data file.
    #[error("cannot open data file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    /// The page id is the reserved invalid sentinel.
    #[error("invalid page ID: {page_id}")]
    InvalidPageId { page_id: PageId },

    /// The caller's buffer does not match the page size.
    #[error("buffer length {actual} does not match page size {expected}")]
    BufferSize { expected: usize, actual: usize },
}
