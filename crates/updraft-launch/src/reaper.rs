#![forbid(unsafe_code)]

//! Deletes updates the selection policy no longer needs, then their orphaned asset files.
//!
//! Runs after a successful launch, never during one. Every step is best-effort: a failure is
//! logged and skips the steps that depend on it, and nothing is reported as an error.

use std::{io, path::PathBuf, sync::Arc};

use tracing::{debug, info, warn};
use updraft_core::{Update, UpdateId};
use updraft_platform::IoPool;
use updraft_policy::SelectionPolicy;
use updraft_store::RecordStore;

use crate::context::LaunchContext;

/// What one reaper run removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub deleted_updates: Vec<UpdateId>,
    pub deleted_files: Vec<PathBuf>,
}

pub struct Reaper {
    store: Arc<dyn RecordStore>,
    pool: IoPool,
    scope_key: String,
    updates_dir: PathBuf,
    policy: SelectionPolicy,
}

impl Reaper {
    pub fn new(ctx: &LaunchContext, policy: SelectionPolicy) -> Self {
        Self {
            store: Arc::clone(&ctx.store),
            pool: ctx.pool.clone(),
            scope_key: ctx.config.scope_key.clone(),
            updates_dir: ctx.config.updates_dir.clone(),
            policy,
        }
    }

    /// Remove updates the policy selects for deletion relative to `launched`.
    ///
    /// Does nothing without a launched update.
    pub async fn reap_unused_updates(&self, launched: Option<&Update>) -> ReapReport {
        let mut report = ReapReport::default();
        let Some(launched) = launched else {
            warn!("reaper skipped: no launched update");
            return report;
        };

        let updates = match self.store.all_updates().await {
            Ok(updates) => updates,
            Err(error) => {
                warn!(%error, "reaper could not list updates");
                return report;
            }
        };
        let filters = self
            .store
            .manifest_filters(&self.scope_key)
            .await
            .unwrap_or_else(|error| {
                warn!(%error, "reaper could not read manifest filters, assuming none");
                None
            });

        let doomed: Vec<UpdateId> = self
            .policy
            .select_updates_to_delete(&updates, Some(launched), filters.as_ref())
            .into_iter()
            .map(|u| u.id)
            .collect();
        if !doomed.is_empty() {
            if let Err(error) = self.store.delete_updates(&doomed).await {
                warn!(%error, count = doomed.len(), "reaper could not delete updates");
                return report;
            }
            report.deleted_updates = doomed;
        }

        let unused = match self.store.delete_unused_assets().await {
            Ok(unused) => unused,
            Err(error) => {
                warn!(%error, "reaper could not delete unused assets");
                return report;
            }
        };
        let paths: Vec<PathBuf> = unused
            .iter()
            .filter_map(|asset| match asset.local_path(&self.updates_dir) {
                Ok(path) => Some(path),
                Err(error) => {
                    warn!(asset_key = %asset.key, %error, "skipping asset with invalid key");
                    None
                }
            })
            .collect();

        report.deleted_files = self.remove_files(paths).await;
        info!(
            updates = report.deleted_updates.len(),
            files = report.deleted_files.len(),
            "reaper finished"
        );
        report
    }

    async fn remove_files(&self, paths: Vec<PathBuf>) -> Vec<PathBuf> {
        if paths.is_empty() {
            return paths;
        }
        let removed = self
            .pool
            .spawn_async(move || {
                paths
                    .into_iter()
                    .filter(|path| match std::fs::remove_file(path) {
                        Ok(()) => true,
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {
                            debug!(path = ?path, "asset file already gone");
                            false
                        }
                        Err(error) => {
                            warn!(path = ?path, %error, "could not remove asset file");
                            false
                        }
                    })
                    .collect()
            })
            .await;
        removed.unwrap_or_else(|error| {
            warn!(%error, "asset file removal aborted");
            Vec::new()
        })
    }
}
