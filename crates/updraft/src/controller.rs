#![forbid(unsafe_code)]

//! Cold-start orchestration on top of the launchers and the reaper.
//!
//! ## Normative
//! - A controller launches once. The database launcher runs first; if it fails, the embedded
//!   update is launched without the store and the launch is flagged as an emergency launch.
//! - The reaper runs after a successful database launch only, once the launcher's bookkeeping
//!   writes have landed.
//! - Launch counters are never touched during an emergency launch.

use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use updraft_core::Update;
use updraft_launch::{
    DatabaseLauncher, LaunchContext, LaunchError, LaunchOutcome, LaunchResult, Launcher,
    NoDatabaseLauncher, ReapReport, Reaper,
};
use updraft_platform::Mutex;
use updraft_policy::SelectionPolicy;

#[derive(Debug)]
struct Launched {
    outcome: LaunchOutcome,
    /// Why the database launch failed, for emergency launches.
    emergency_reason: Option<String>,
}

/// Owns one process's launch: selection, fallback, reaping and launch bookkeeping.
pub struct UpdatesController {
    ctx: LaunchContext,
    default_policy: SelectionPolicy,
    next_policy: Mutex<Option<SelectionPolicy>>,
    started: AtomicBool,
    launched: Mutex<Option<Launched>>,
    reaper: Mutex<Option<JoinHandle<ReapReport>>>,
}

impl UpdatesController {
    /// Controller whose default policy follows `ctx.config.reaper`.
    pub fn new(ctx: LaunchContext) -> Self {
        let default_policy = ctx.config.reaper.selection_policy();
        Self {
            ctx,
            default_policy,
            next_policy: Mutex::new(None),
            started: AtomicBool::new(false),
            launched: Mutex::new(None),
            reaper: Mutex::new(None),
        }
    }

    /// Use `policy` for the next launch instead of the configured one.
    pub fn set_next_selection_policy(&self, policy: SelectionPolicy) {
        *self.next_policy.lock() = Some(policy);
    }

    pub fn reset_selection_policy(&self) {
        *self.next_policy.lock() = None;
    }

    fn selection_policy(&self) -> SelectionPolicy {
        self.next_policy
            .lock()
            .clone()
            .unwrap_or_else(|| self.default_policy.clone())
    }

    /// Launch an update.
    ///
    /// # Errors
    ///
    /// [`LaunchError::AlreadyLaunched`] on a second call. Otherwise the database launcher's
    /// error, when the embedded fallback could not launch either.
    pub async fn start(&self) -> LaunchResult<LaunchOutcome> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(LaunchError::AlreadyLaunched);
        }
        let policy = self.selection_policy();
        let launcher = Arc::new(DatabaseLauncher::new(self.ctx.clone(), policy.clone()));

        let (outcome, emergency_reason) = match launcher.launch().await {
            Ok(outcome) => {
                self.spawn_reaper(Arc::clone(&launcher), policy, outcome.launched_update.clone());
                (outcome, None)
            }
            Err(error) => {
                warn!(%error, "database launch failed, launching embedded update");
                let fallback = NoDatabaseLauncher::new(Arc::clone(&self.ctx.embedded));
                match fallback.launch().await {
                    Ok(outcome) => (outcome, Some(error.to_string())),
                    Err(fallback_error) => {
                        warn!(error = %fallback_error, "embedded launch failed");
                        return Err(error);
                    }
                }
            }
        };

        *self.launched.lock() = Some(Launched {
            outcome: outcome.clone(),
            emergency_reason,
        });
        Ok(outcome)
    }

    fn spawn_reaper(&self, launcher: Arc<DatabaseLauncher>, policy: SelectionPolicy, launched: Update) {
        let reaper = Reaper::new(&self.ctx, policy);
        let handle = tokio::spawn(async move {
            launcher.settle().await;
            reaper.reap_unused_updates(Some(&launched)).await
        });
        *self.reaper.lock() = Some(handle);
    }

    /// Wait for the post-launch reaper. `None` if it never ran.
    pub async fn wait_for_reaper(&self) -> Option<ReapReport> {
        let handle = self.reaper.lock().take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(error) => {
                warn!(%error, "reaper task failed");
                None
            }
        }
    }

    pub fn launched_update(&self) -> Option<Update> {
        self.launched
            .lock()
            .as_ref()
            .map(|l| l.outcome.launched_update.clone())
    }

    pub fn launch_asset_path(&self) -> Option<PathBuf> {
        self.launched
            .lock()
            .as_ref()
            .and_then(|l| l.outcome.launch_asset_path.clone())
    }

    pub fn asset_map(&self) -> BTreeMap<String, PathBuf> {
        self.launched
            .lock()
            .as_ref()
            .map(|l| l.outcome.asset_map.clone())
            .unwrap_or_default()
    }

    pub fn is_emergency_launch(&self) -> bool {
        self.emergency_launch_reason().is_some()
    }

    /// The database launch error behind an emergency launch.
    pub fn emergency_launch_reason(&self) -> Option<String> {
        self.launched
            .lock()
            .as_ref()
            .and_then(|l| l.emergency_reason.clone())
    }

    /// Whether a freshly fetched update should be downloaded, given what is running now and
    /// the stored manifest filters.
    ///
    /// # Errors
    ///
    /// [`LaunchError::Store`] if the manifest filters cannot be read.
    pub async fn should_load_new_update(&self, new_update: Option<&Update>) -> LaunchResult<bool> {
        let filters = self
            .ctx
            .store
            .manifest_filters(&self.ctx.config.scope_key)
            .await?;
        let launched = self.launched_update();
        Ok(self.selection_policy().should_load_new_update(
            new_update,
            launched.as_ref(),
            filters.as_ref(),
        ))
    }

    /// Record that the launched update ran successfully.
    ///
    /// # Errors
    ///
    /// [`LaunchError::Store`] if the counter cannot be written.
    pub async fn mark_successful_launch(&self) -> LaunchResult<()> {
        let Some(update) = self.counted_update() else {
            return Ok(());
        };
        self.ctx
            .store
            .increment_successful_launch_count(update.id)
            .await?;
        info!(update_id = %update.id, "launch marked successful");
        Ok(())
    }

    /// Record that the launched update failed to run.
    ///
    /// # Errors
    ///
    /// [`LaunchError::Store`] if the counter cannot be written.
    pub async fn mark_failed_launch(&self) -> LaunchResult<()> {
        let Some(update) = self.counted_update() else {
            return Ok(());
        };
        self.ctx
            .store
            .increment_failed_launch_count(update.id)
            .await?;
        warn!(update_id = %update.id, "launch marked failed");
        Ok(())
    }

    /// The launched update, unless launch counters do not apply.
    fn counted_update(&self) -> Option<Update> {
        let launched = self.launched.lock();
        match launched.as_ref() {
            None => {
                debug!("no launched update, launch counters unchanged");
                None
            }
            Some(l) if l.emergency_reason.is_some() => {
                debug!("emergency launch, launch counters unchanged");
                None
            }
            Some(l) => Some(l.outcome.launched_update.clone()),
        }
    }
}
