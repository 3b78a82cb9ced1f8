#![forbid(unsafe_code)]

use tokio::sync::Mutex;

use crate::{
    error::StoreResult,
    records::{Records, impl_record_store},
};

/// Volatile [`RecordStore`](crate::RecordStore): every call is serialized through one async
/// mutex and nothing outlives the process.
#[derive(Debug)]
pub struct MemRecordStore {
    records: Mutex<Records>,
}

impl MemRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Records::new()),
        }
    }

    async fn read<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&Records) -> R + Send,
    {
        Ok(f(&*self.records.lock().await))
    }

    async fn write<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Records) -> StoreResult<R> + Send,
    {
        f(&mut *self.records.lock().await)
    }
}

impl Default for MemRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl_record_store!(MemRecordStore);
