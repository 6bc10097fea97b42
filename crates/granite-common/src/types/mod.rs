//! Core type definitions for GraniteDB.

mod ids;

pub use ids::{Lsn, PageId};
