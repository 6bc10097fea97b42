//! Concurrent containers used by the storage engine.
//!
//! The only container today is the extendible hash table backing the
//! buffer pool's page directory. It is generic and usable as an ordinary
//! concurrent map.

mod extendible;

pub use extendible::ExtendibleHashTable;
