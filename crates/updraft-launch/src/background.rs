#![forbid(unsafe_code)]

//! Detached best-effort writes (mark-accessed, asset write-back).
//!
//! Failures are logged and never reach the launch result. Handles are kept only so callers
//! that need the writes to have landed (tests, shutdown) can wait for them.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::warn;
use updraft_platform::Mutex;
use updraft_store::StoreResult;

#[derive(Debug, Default)]
pub(crate) struct BestEffort {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BestEffort {
    pub(crate) fn spawn<F>(&self, what: &'static str, fut: F)
    where
        F: Future<Output = StoreResult<()>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            if let Err(error) = fut.await {
                warn!(what, %error, "best-effort write failed");
            }
        });
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Wait until every write spawned so far has finished.
    pub(crate) async fn settle(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}
