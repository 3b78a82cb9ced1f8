#![forbid(unsafe_code)]

use std::{
    io,
    path::{Path, PathBuf},
};

use tokio::sync::Mutex;
use tracing::{debug, warn};
use updraft_platform::{IoPool, write_atomic};

use crate::{
    error::StoreResult,
    records::{Records, impl_record_store},
};

/// [`RecordStore`](crate::RecordStore) persisted as a JSON snapshot.
///
/// ## Normative
/// - Every mutation rewrites the whole snapshot atomically (temp file + rename) before it
///   becomes visible to readers; a failed write leaves both the file and the in-memory state
///   unchanged.
/// - A missing, empty or unparseable snapshot opens as an empty store.
/// - File I/O runs on the [`IoPool`], never on the calling task.
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    pool: IoPool,
    records: Mutex<Records>,
}

impl FileRecordStore {
    /// Open (or create on first write) the snapshot at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    pub async fn open<P: Into<PathBuf>>(path: P) -> StoreResult<Self> {
        Self::open_with_pool(path, IoPool::default()).await
    }

    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read.
    pub async fn open_with_pool<P: Into<PathBuf>>(path: P, pool: IoPool) -> StoreResult<Self> {
        let path = path.into();
        let read_path = path.clone();
        let bytes = pool
            .run(move || match std::fs::read(&read_path) {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
                Err(e) => Err(e),
            })
            .await?;

        let records = if bytes.is_empty() {
            Records::new()
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = ?path, error = %e, "record snapshot unreadable, starting empty");
                    Records::new()
                }
            }
        };
        debug!(path = ?path, "record store opened");

        Ok(Self {
            path,
            pool,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
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
        let mut guard = self.records.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;

        let bytes = serde_json::to_vec_pretty(&next)?;
        let path = self.path.clone();
        self.pool.run(move || write_atomic(&path, &bytes)).await?;

        *guard = next;
        Ok(out)
    }
}

impl_record_store!(FileRecordStore);
