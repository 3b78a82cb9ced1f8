#![forbid(unsafe_code)]

use std::{fmt, sync::Arc};

use updraft_net::Downloader;
use updraft_platform::IoPool;
use updraft_store::RecordStore;

use crate::{config::UpdatesConfig, embedded::EmbeddedBundle, reconcile::AssetReconciler};

/// Collaborators shared by the launchers and the reaper of one process.
///
/// Cloning is cheap; every collaborator is behind an `Arc`.
#[derive(Clone)]
pub struct LaunchContext {
    pub config: UpdatesConfig,
    pub store: Arc<dyn RecordStore>,
    pub downloader: Arc<dyn Downloader>,
    pub embedded: Arc<dyn EmbeddedBundle>,
    pub pool: IoPool,
}

impl LaunchContext {
    pub fn new(
        config: UpdatesConfig,
        store: Arc<dyn RecordStore>,
        downloader: Arc<dyn Downloader>,
        embedded: Arc<dyn EmbeddedBundle>,
    ) -> Self {
        Self {
            config,
            store,
            downloader,
            embedded,
            pool: IoPool::default(),
        }
    }

    #[must_use]
    pub fn with_pool(mut self, pool: IoPool) -> Self {
        self.pool = pool;
        self
    }

    /// A reconciler writing into `config.updates_dir`.
    pub fn reconciler(&self) -> AssetReconciler {
        AssetReconciler::new(
            &self.config.updates_dir,
            Arc::clone(&self.store),
            Arc::clone(&self.downloader),
            Arc::clone(&self.embedded),
            self.pool.clone(),
            self.config.request_headers(),
        )
    }
}

impl fmt::Debug for LaunchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchContext")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
