#![forbid(unsafe_code)]

use updraft_core::{ManifestFilters, Update, matches};

/// Chooses which stored update to launch.
pub trait LauncherSelectionPolicy: Send + Sync {
    /// Pick one update out of `updates`, or `None` if nothing is eligible.
    fn select_update_to_launch(
        &self,
        updates: &[Update],
        filters: Option<&ManifestFilters>,
    ) -> Option<Update>;
}

/// Newest launchable update that passes the manifest filters.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilterAwareLauncher;

impl LauncherSelectionPolicy for FilterAwareLauncher {
    fn select_update_to_launch(
        &self,
        updates: &[Update],
        filters: Option<&ManifestFilters>,
    ) -> Option<Update> {
        updates
            .iter()
            .filter(|u| u.status.is_launchable())
            .filter(|u| matches(u, filters))
            .max_by_key(|u| u.recency())
            .cloned()
    }
}
