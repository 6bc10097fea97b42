//! Write-ahead-log hook consumed by the buffer pool.
//!
//! The buffer pool does not implement WAL ordering itself; it only
//! reserves the seam. When a [`LogManager`] is wired in, the pool asks it
//! to flush the log up to a frame's last-modification LSN before that
//! frame's bytes are written back, which is the write-ahead rule a real
//! recovery component depends on.

use granite_common::types::Lsn;
use thiserror::Error;

/// Result type for log manager operations.
pub type WalResult<T> = Result<T, WalError>;

/// Errors surfaced by a log manager.
#[derive(Debug, Error)]
#[allow(missing_docs)] // Fields are documented by variant docs
pub enum WalError {
    /// The log device failed.
    #[error("log I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The log manager is shutting down and cannot accept flushes.
    #[error("log manager is shutting down")]
    ShuttingDown,
}

/// Provider of write-ahead-log durability.
///
/// Only the flush-ordering hook is specified here; record formats, group
/// commit, and recovery live with the implementation.
pub trait LogManager: Send + Sync {
    /// Blocks until every log record with an LSN at or below `lsn` is
    /// durable.
    fn flush_to_lsn(&self, lsn: Lsn) -> WalResult<()>;
}

/// Log manager that accepts every flush without doing anything.
///
/// Stands in for a real WAL in tests and in deployments that run the pool
/// without recovery.
#[derive(Debug, Default)]
pub struct NoopLogManager;

impl LogManager for NoopLogManager {
    fn flush_to_lsn(&self, _lsn: Lsn) -> WalResult<()> {
        Ok(())
    }
}
