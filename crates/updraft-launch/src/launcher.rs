#![forbid(unsafe_code)]

//! Launchers: pick one update and make it runnable.
//!
//! [`DatabaseLauncher`] is the normal cold-start path. [`NoDatabaseLauncher`] is the emergency
//! path when the store cannot be used at all: it always launches the embedded update straight
//! from the binary's resources.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, info};
use updraft_core::{Update, UpdateStatus};
use updraft_platform::Mutex;
use updraft_policy::SelectionPolicy;

use crate::{
    background::BestEffort,
    context::LaunchContext,
    embedded::EmbeddedBundle,
    error::{AssetError, LaunchError, LaunchResult},
    reconcile::AssetReconciler,
};

/// A runnable update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub launched_update: Update,
    /// Entry point. `None` for development updates, which are served by their transport.
    pub launch_asset_path: Option<PathBuf>,
    /// Key → local path of every available asset. Empty when running from embedded assets.
    pub asset_map: BTreeMap<String, PathBuf>,
    /// The launch asset comes straight from the binary's resources.
    pub using_embedded_assets: bool,
}

/// Progress of one launch attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaunchState {
    Idle,
    SelectingCandidate,
    Reconciling,
    Done { success: bool },
}

#[async_trait]
pub trait Launcher: Send + Sync {
    /// Run the launch attempt.
    ///
    /// # Errors
    ///
    /// [`LaunchError::AlreadyLaunched`] on any call after the first.
    async fn launch(&self) -> LaunchResult<LaunchOutcome>;

    fn state(&self) -> LaunchState;
}

#[derive(Debug)]
struct StateCell(Mutex<LaunchState>);

impl StateCell {
    fn new() -> Self {
        Self(Mutex::new(LaunchState::Idle))
    }

    fn begin(&self) -> LaunchResult<()> {
        let mut state = self.0.lock();
        if *state != LaunchState::Idle {
            return Err(LaunchError::AlreadyLaunched);
        }
        *state = LaunchState::SelectingCandidate;
        Ok(())
    }

    fn set(&self, next: LaunchState) {
        *self.0.lock() = next;
    }

    fn get(&self) -> LaunchState {
        *self.0.lock()
    }

    fn finish<T>(&self, result: LaunchResult<T>) -> LaunchResult<T> {
        self.set(LaunchState::Done {
            success: result.is_ok(),
        });
        result
    }
}

/// Launch the embedded update from the binary's resources. No asset map is produced.
fn embedded_outcome(
    embedded: &dyn EmbeddedBundle,
    launched_update: Update,
) -> LaunchResult<LaunchOutcome> {
    let manifest = embedded
        .embedded_manifest()
        .ok_or(LaunchError::NoEmbeddedUpdate)?;
    let launch_asset = manifest
        .launch_asset()
        .ok_or(LaunchError::MissingLaunchAsset(manifest.update.id))?;
    let missing = || LaunchError::LaunchAsset {
        key: launch_asset.key.clone(),
        source: AssetError::MissingResource(launch_asset.key.clone()),
    };
    let path = launch_asset
        .main_bundle_filename
        .as_deref()
        .and_then(|name| embedded.resource_path(name))
        .ok_or_else(missing)?;

    Ok(LaunchOutcome {
        launched_update,
        launch_asset_path: Some(path),
        asset_map: BTreeMap::new(),
        using_embedded_assets: true,
    })
}

/// Launches the best stored update, repairing its assets on the way.
pub struct DatabaseLauncher {
    ctx: LaunchContext,
    policy: SelectionPolicy,
    reconciler: AssetReconciler,
    writes: Arc<BestEffort>,
    state: StateCell,
}

impl DatabaseLauncher {
    pub fn new(ctx: LaunchContext, policy: SelectionPolicy) -> Self {
        let writes = Arc::new(BestEffort::default());
        let reconciler = ctx.reconciler().with_writes(Arc::clone(&writes));
        Self {
            ctx,
            policy,
            reconciler,
            writes,
            state: StateCell::new(),
        }
    }

    /// The reconciler this launcher drives; usable on its own to re-check assets.
    pub fn reconciler(&self) -> &AssetReconciler {
        &self.reconciler
    }

    /// Wait for best-effort bookkeeping (mark-accessed, asset write-back) to land.
    pub async fn settle(&self) {
        self.writes.settle().await;
    }

    async fn select(&self) -> LaunchResult<Update> {
        let config = &self.ctx.config;
        let store = &self.ctx.store;

        let updates = store
            .launchable_updates(&config.scope_key, &config.runtime_version)
            .await
            .map_err(|e| LaunchError::no_launchable(Some(e)))?;
        let filters = store
            .manifest_filters(&config.scope_key)
            .await
            .map_err(|e| LaunchError::no_launchable(Some(e)))?;

        // A stored embedded row is only valid for the build that wrote it.
        let embedded_id = config
            .has_embedded_update
            .then(|| self.ctx.embedded.embedded_manifest().map(|m| m.update.id))
            .flatten();
        let candidates: Vec<Update> = updates
            .into_iter()
            .filter(|u| u.status != UpdateStatus::Embedded || Some(u.id) == embedded_id)
            .collect();

        let selected = self
            .policy
            .select_update_to_launch(&candidates, filters.as_ref())
            .ok_or_else(|| LaunchError::no_launchable(None))?;
        debug!(
            update_id = %selected.id,
            status = ?selected.status,
            candidates = candidates.len(),
            "update selected for launch"
        );
        Ok(selected)
    }

    async fn run(&self) -> LaunchResult<LaunchOutcome> {
        let update = self.select().await?;

        let store = Arc::clone(&self.ctx.store);
        let id = update.id;
        self.writes
            .spawn("mark_accessed", async move { store.mark_accessed(id).await });

        match update.status {
            UpdateStatus::Embedded => embedded_outcome(self.ctx.embedded.as_ref(), update),
            UpdateStatus::Development => Ok(LaunchOutcome {
                launched_update: update,
                launch_asset_path: None,
                asset_map: BTreeMap::new(),
                using_embedded_assets: false,
            }),
            _ => {
                self.state.set(LaunchState::Reconciling);
                let assets = self.ctx.store.assets_for_update(id).await?;
                let report = self.reconciler.ensure_all_assets_exist(assets).await;
                let (launch_asset_path, asset_map) = report.into_launch(id)?;
                Ok(LaunchOutcome {
                    launched_update: update,
                    launch_asset_path: Some(launch_asset_path),
                    asset_map,
                    using_embedded_assets: false,
                })
            }
        }
    }
}

#[async_trait]
impl Launcher for DatabaseLauncher {
    async fn launch(&self) -> LaunchResult<LaunchOutcome> {
        self.state.begin()?;
        let result = self.run().await;
        if let Ok(outcome) = &result {
            info!(update_id = %outcome.launched_update.id, "launching update");
        }
        self.state.finish(result)
    }

    fn state(&self) -> LaunchState {
        self.state.get()
    }
}

/// Emergency launcher: runs the embedded update without touching the store.
pub struct NoDatabaseLauncher {
    embedded: Arc<dyn EmbeddedBundle>,
    state: StateCell,
}

impl NoDatabaseLauncher {
    pub fn new(embedded: Arc<dyn EmbeddedBundle>) -> Self {
        Self {
            embedded,
            state: StateCell::new(),
        }
    }
}

#[async_trait]
impl Launcher for NoDatabaseLauncher {
    async fn launch(&self) -> LaunchResult<LaunchOutcome> {
        self.state.begin()?;
        let result = self
            .embedded
            .embedded_manifest()
            .ok_or(LaunchError::NoEmbeddedUpdate)
            .and_then(|m| embedded_outcome(self.embedded.as_ref(), m.update.clone()));
        if let Ok(outcome) = &result {
            info!(update_id = %outcome.launched_update.id, "launching embedded update without database");
        }
        self.state.finish(result)
    }

    fn state(&self) -> LaunchState {
        self.state.get()
    }
}
