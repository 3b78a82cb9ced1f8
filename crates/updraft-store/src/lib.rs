#![forbid(unsafe_code)]

//! # updraft-store
//!
//! Durable records behind the launch engine: updates, their assets, launch counters and the
//! manifest filters last served for each scope.
//!
//! [`RecordStore`] is the contract; [`MemRecordStore`] and [`FileRecordStore`] implement it
//! over the same record tables, the latter persisting them as a crash-safe JSON snapshot.

mod error;
mod file;
mod mem;
mod records;
mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileRecordStore;
pub use mem::MemRecordStore;
pub use traits::RecordStore;
