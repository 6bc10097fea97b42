//! Buffer pool errors.

use granite_common::types::PageId;
use thiserror::Error;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum BufferError {
    /// No free frames and no evictable frames: every page is pinned.
    #[error("no free frames available, all pages are pinned")]
    NoFreeFrames,

    /// Page not resident in the buffer pool.
    #[error("page {page_id} not found in buffer pool")]
    PageNotFound { page_id: PageId },

    /// Page cannot be deleted while pinned.
    #[error("page {page_id} is pinned")]
    PagePinned { page_id: PageId },

    /// The disk manager failed.
    #[error("disk error: {0}")]
    Disk(#[from] crate::disk::DiskError),

    /// The log manager failed while enforcing write-ahead ordering.
    #[error("log flush error: {0}")]
    Wal(#[from] crate::wal::WalError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a transient outcome the caller can retry
    /// (typically after unpinning something).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoFreeFrames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(BufferError::NoFreeFrames.is_retryable());
        assert!(!BufferError::PageNotFound {
            page_id: PageId::new(1)
        }
        .is_retryable());
        assert!(!BufferError::config("bad").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = BufferError::PagePinned {
            page_id: PageId::new(3),
        };
        assert_eq!(err.to_string(), "page 3 is pinned");
    }
}
