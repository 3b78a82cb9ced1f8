#![forbid(unsafe_code)]

use std::{fmt, num::NonZeroUsize, sync::Arc};

use updraft_core::{ManifestFilters, Update};

use crate::{
    launcher::{FilterAwareLauncher, LauncherSelectionPolicy},
    loader::{FilterAwareLoader, LoaderSelectionPolicy},
    reaper::{DevelopmentClientReaper, FilterAwareReaper, ReaperSelectionPolicy},
};

/// The three decisions the update engine delegates to policy, bundled together.
///
/// Cloning is cheap; the individual policies are shared behind `Arc`.
#[derive(Clone)]
pub struct SelectionPolicy {
    launcher: Arc<dyn LauncherSelectionPolicy>,
    loader: Arc<dyn LoaderSelectionPolicy>,
    reaper: Arc<dyn ReaperSelectionPolicy>,
}

impl SelectionPolicy {
    pub fn new(
        launcher: Arc<dyn LauncherSelectionPolicy>,
        loader: Arc<dyn LoaderSelectionPolicy>,
        reaper: Arc<dyn ReaperSelectionPolicy>,
    ) -> Self {
        Self {
            launcher,
            loader,
            reaper,
        }
    }

    /// Production policy: every decision honors manifest filters.
    pub fn filter_aware() -> Self {
        Self::new(
            Arc::new(FilterAwareLauncher),
            Arc::new(FilterAwareLoader),
            Arc::new(FilterAwareReaper),
        )
    }

    /// Filter-aware launching and loading, capacity-bounded retention.
    pub fn development_client(max_updates_to_keep: NonZeroUsize) -> Self {
        Self::new(
            Arc::new(FilterAwareLauncher),
            Arc::new(FilterAwareLoader),
            Arc::new(DevelopmentClientReaper::new(max_updates_to_keep)),
        )
    }

    #[must_use]
    pub fn with_reaper(mut self, reaper: Arc<dyn ReaperSelectionPolicy>) -> Self {
        self.reaper = reaper;
        self
    }

    pub fn select_update_to_launch(
        &self,
        updates: &[Update],
        filters: Option<&ManifestFilters>,
    ) -> Option<Update> {
        self.launcher.select_update_to_launch(updates, filters)
    }

    pub fn select_updates_to_delete(
        &self,
        updates: &[Update],
        launched_update: Option<&Update>,
        filters: Option<&ManifestFilters>,
    ) -> Vec<Update> {
        self.reaper
            .select_updates_to_delete(updates, launched_update, filters)
    }

    pub fn should_load_new_update(
        &self,
        new_update: Option<&Update>,
        launched_update: Option<&Update>,
        filters: Option<&ManifestFilters>,
    ) -> bool {
        self.loader
            .should_load_new_update(new_update, launched_update, filters)
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::filter_aware()
    }
}

impl fmt::Debug for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionPolicy").finish_non_exhaustive()
    }
}
