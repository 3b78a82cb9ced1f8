#![forbid(unsafe_code)]

//! Makes every asset of an update present on disk before launch.
//!
//! Each asset goes through disk → embedded copy → download, stopping at the first stage that
//! succeeds. Assets are independent: one worker task per asset, results reported back over a
//! channel to the coordinating task, which alone advances the per-attempt progress counter.
//!
//! ## Normative
//! - A file that cannot be inspected on disk counts as absent.
//! - Reconciliation completes when every asset has been attempted, never on the first failure.
//! - A failed non-launch asset is logged and left out of the asset map.
//! - A failed launch asset is remembered in the report; the launcher turns it into the launch
//!   failure.
//! - Repaired asset records are written back to the store best-effort.

use std::{
    collections::{BTreeMap, HashSet},
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use updraft_core::{Asset, ContentHash, UpdateId};
use updraft_net::{Downloader, Headers};
use updraft_platform::{IoPool, write_atomic};
use updraft_store::RecordStore;

use crate::{
    background::BestEffort,
    embedded::EmbeddedBundle,
    error::{AssetError, AssetResult, LaunchError, LaunchResult},
};

/// How an asset ended up on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetSource {
    /// Already present.
    Disk,
    /// Copied out of the binary's embedded resources.
    Embedded,
    Downloaded,
}

/// Completion counter scoped to one reconciliation attempt.
#[derive(Debug)]
struct ReconcileProgress {
    completed: AtomicUsize,
    total: usize,
}

impl ReconcileProgress {
    fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Count one attempted asset. Returns `true` exactly once: when the last asset lands.
    fn record(&self) -> bool {
        self.completed.fetch_add(1, Ordering::AcqRel) + 1 == self.total
    }

    fn total(&self) -> usize {
        self.total
    }
}

/// Outcome of [`AssetReconciler::ensure_all_assets_exist`].
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Key → local path of every asset that is on disk, launch asset included.
    pub asset_map: BTreeMap<String, PathBuf>,
    /// How each asset in `asset_map` was satisfied.
    pub sources: BTreeMap<String, AssetSource>,
    /// Key → cause for every asset that failed all stages.
    pub failures: BTreeMap<String, AssetError>,
    pub launch_asset_key: Option<String>,
    /// Number of assets attempted.
    pub attempted: usize,
}

impl ReconcileReport {
    pub fn launch_asset_path(&self) -> Option<&Path> {
        self.launch_asset_key
            .as_ref()
            .and_then(|key| self.asset_map.get(key))
            .map(PathBuf::as_path)
    }

    /// Launch asset path and the asset map, or the launch asset's failure.
    ///
    /// # Errors
    ///
    /// [`LaunchError::MissingLaunchAsset`] if the update has no launch asset,
    /// [`LaunchError::LaunchAsset`] if the launch asset could not be made available.
    pub fn into_launch(
        mut self,
        update_id: UpdateId,
    ) -> LaunchResult<(PathBuf, BTreeMap<String, PathBuf>)> {
        let key = self
            .launch_asset_key
            .take()
            .ok_or(LaunchError::MissingLaunchAsset(update_id))?;
        if let Some(source) = self.failures.remove(&key) {
            return Err(LaunchError::LaunchAsset { key, source });
        }
        match self.asset_map.get(&key) {
            Some(path) => Ok((path.clone(), self.asset_map)),
            None => Err(LaunchError::LaunchAsset {
                key,
                source: AssetError::Interrupted,
            }),
        }
    }
}

/// Per-asset work, cloned into each worker task.
#[derive(Clone)]
struct AssetWorker {
    updates_dir: Arc<Path>,
    downloader: Arc<dyn Downloader>,
    embedded: Arc<dyn EmbeddedBundle>,
    pool: IoPool,
    request_headers: Headers,
}

struct Resolved {
    path: PathBuf,
    source: AssetSource,
    /// Record to persist, for stages that changed it.
    record: Option<Asset>,
}

impl AssetWorker {
    async fn resolve(&self, asset: Asset) -> AssetResult<Resolved> {
        let path = asset.local_path(&self.updates_dir)?;

        if self.exists(&path).await {
            trace!(asset_key = %asset.key, path = ?path, "asset already on disk");
            return Ok(Resolved {
                path,
                source: AssetSource::Disk,
                record: None,
            });
        }

        let copy_error = match self.copy_embedded(&asset, &path).await {
            Some(Ok(hash)) => {
                debug!(asset_key = %asset.key, "asset copied from embedded bundle");
                let mut record = asset;
                record.mark_downloaded(hash, BTreeMap::new(), Utc::now());
                return Ok(Resolved {
                    path,
                    source: AssetSource::Embedded,
                    record: Some(record),
                });
            }
            Some(Err(e)) => {
                debug!(asset_key = %asset.key, error = %e, "embedded copy failed");
                Some(e)
            }
            None => None,
        };

        let Some(url) = asset.url.clone() else {
            return Err(copy_error.unwrap_or(AssetError::NoUrl));
        };
        let headers = self
            .request_headers
            .merged(&Headers::from(asset.extra_request_headers.clone()));
        let outcome = self
            .downloader
            .download_file(&url, asset.expected_hash.as_ref(), &path, &headers)
            .await?;
        debug!(asset_key = %asset.key, %url, len = outcome.len, "asset downloaded");

        let mut record = asset;
        record.mark_downloaded(
            outcome.content_hash,
            outcome.response_headers.into_map(),
            Utc::now(),
        );
        Ok(Resolved {
            path,
            source: AssetSource::Downloaded,
            record: Some(record),
        })
    }

    async fn exists(&self, path: &Path) -> bool {
        let target = path.to_path_buf();
        match self
            .pool
            .run(move || match std::fs::metadata(&target) {
                Ok(meta) => Ok(meta.is_file()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            })
            .await
        {
            Ok(found) => found,
            Err(error) => {
                debug!(path = ?path, %error, "stat failed, treating asset as absent");
                false
            }
        }
    }

    /// `None` if the running binary embeds no copy of this asset.
    async fn copy_embedded(&self, asset: &Asset, dest: &Path) -> Option<AssetResult<ContentHash>> {
        let filename = self
            .embedded
            .embedded_manifest()?
            .asset(&asset.key)?
            .main_bundle_filename
            .clone()?;
        let Some(src) = self.embedded.resource_path(&filename) else {
            return Some(Err(AssetError::MissingResource(filename)));
        };

        let dest = dest.to_path_buf();
        let copied = self
            .pool
            .run(move || {
                let bytes = std::fs::read(&src)?;
                write_atomic(&dest, &bytes)?;
                Ok(ContentHash::of_bytes(&bytes))
            })
            .await;
        Some(copied.map_err(|source| AssetError::Copy { filename, source }))
    }
}

/// Ensures all assets of an update exist on disk.
///
/// Can be re-run on its own (e.g. for diagnostics); each call is an independent attempt.
pub struct AssetReconciler {
    worker: AssetWorker,
    store: Arc<dyn RecordStore>,
    writes: Arc<BestEffort>,
}

impl AssetReconciler {
    pub fn new(
        updates_dir: &Path,
        store: Arc<dyn RecordStore>,
        downloader: Arc<dyn Downloader>,
        embedded: Arc<dyn EmbeddedBundle>,
        pool: IoPool,
        request_headers: Headers,
    ) -> Self {
        Self {
            worker: AssetWorker {
                updates_dir: Arc::from(updates_dir),
                downloader,
                embedded,
                pool,
                request_headers,
            },
            store,
            writes: Arc::new(BestEffort::default()),
        }
    }

    pub(crate) fn with_writes(mut self, writes: Arc<BestEffort>) -> Self {
        self.writes = writes;
        self
    }

    pub fn updates_dir(&self) -> &Path {
        &self.worker.updates_dir
    }

    /// Attempt every asset and report the outcome. Never fails as a whole.
    pub async fn ensure_all_assets_exist(&self, assets: Vec<Asset>) -> ReconcileReport {
        let mut report = ReconcileReport {
            launch_asset_key: assets
                .iter()
                .find(|a| a.is_launch_asset)
                .map(|a| a.key.clone()),
            ..ReconcileReport::default()
        };
        if assets.is_empty() {
            return report;
        }

        let progress = ReconcileProgress::new(assets.len());
        let mut pending: HashSet<String> = assets.iter().map(|a| a.key.clone()).collect();
        let (tx, mut rx) = mpsc::channel(assets.len());

        for asset in assets {
            let worker = self.worker.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let key = asset.key.clone();
                let result = worker.resolve(asset).await;
                // The coordinator may have gone away; nothing left to report to.
                let _ = tx.send((key, result)).await;
            });
        }
        drop(tx);

        while let Some((key, result)) = rx.recv().await {
            pending.remove(&key);
            self.absorb(&mut report, key, result);
            if progress.record() {
                break;
            }
        }

        // Workers that died without reporting.
        for key in pending {
            warn!(asset_key = %key, "asset worker exited without a result");
            report.failures.insert(key, AssetError::Interrupted);
        }
        report.attempted = progress.total();
        debug!(
            attempted = report.attempted,
            available = report.asset_map.len(),
            failed = report.failures.len(),
            "asset reconciliation finished"
        );
        report
    }

    fn absorb(&self, report: &mut ReconcileReport, key: String, result: AssetResult<Resolved>) {
        match result {
            Ok(resolved) => {
                if let Some(record) = resolved.record {
                    let store = Arc::clone(&self.store);
                    self.writes
                        .spawn("update_asset", async move { store.update_asset(record).await });
                }
                report.sources.insert(key.clone(), resolved.source);
                report.asset_map.insert(key, resolved.path);
            }
            Err(error) => {
                if report.launch_asset_key.as_deref() == Some(key.as_str()) {
                    warn!(asset_key = %key, %error, "launch asset unavailable");
                } else {
                    warn!(asset_key = %key, %error, "asset unavailable, launching without it");
                }
                report.failures.insert(key, error);
            }
        }
    }

    /// Wait for outstanding best-effort record writes.
    pub async fn settle(&self) {
        self.writes.settle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fires_once_at_total() {
        let progress = ReconcileProgress::new(3);
        let fired: Vec<bool> = (0..3).map(|_| progress.record()).collect();
        assert_eq!(fired, vec![false, false, true]);
        assert!(!progress.record());
    }
}
