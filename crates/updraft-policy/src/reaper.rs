#![forbid(unsafe_code)]

use std::num::NonZeroUsize;

use tracing::trace;
use updraft_core::{ManifestFilters, Update, matches};

/// Decides which stored updates are safe to delete.
///
/// ## Normative
/// - The launched update is never part of the result.
/// - Without a launched update the result is empty.
/// - The returned list is ordered from the first candidate for deletion to the last.
pub trait ReaperSelectionPolicy: Send + Sync {
    fn select_updates_to_delete(
        &self,
        updates: &[Update],
        launched_update: Option<&Update>,
        filters: Option<&ManifestFilters>,
    ) -> Vec<Update>;
}

/// Keeps the launched update, everything newer, and exactly one older fallback.
///
/// Only updates in the launched update's scope are considered; other scopes are untouched.
///
/// The fallback is the newest older update that passes the filters; if no older update passes
/// them, it is the newest older update regardless of filters. Every other older update is
/// deleted.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilterAwareReaper;

impl ReaperSelectionPolicy for FilterAwareReaper {
    fn select_updates_to_delete(
        &self,
        updates: &[Update],
        launched_update: Option<&Update>,
        filters: Option<&ManifestFilters>,
    ) -> Vec<Update> {
        let Some(launched) = launched_update else {
            return Vec::new();
        };
        let launched_recency = launched.recency();

        let mut older: Vec<&Update> = updates
            .iter()
            .filter(|u| u.scope_key == launched.scope_key && u.recency() < launched_recency)
            .collect();
        older.sort_by_key(|u| u.recency());

        let fallback = older
            .iter()
            .rev()
            .find(|u| matches(u, filters))
            .or_else(|| older.last())
            .map(|u| u.id);

        trace!(
            launched = %launched.id,
            older = older.len(),
            fallback = ?fallback,
            "filter-aware reaper selection"
        );

        older
            .into_iter()
            .filter(|u| Some(u.id) != fallback)
            .cloned()
            .collect()
    }
}

/// Default capacity of [`DevelopmentClientReaper`].
pub const DEFAULT_MAX_UPDATES_TO_KEEP: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(n) => n,
    None => unreachable!(),
};

/// Capacity-bounded retention for development clients.
///
/// Filters and scopes are ignored: development clients juggle many small scopes, and only the
/// total number of stored updates matters. The `max_updates_to_keep` most recently accessed
/// updates survive (ties broken by commit time); the launched update always survives, even
/// when it is not among them.
#[derive(Clone, Copy, Debug)]
pub struct DevelopmentClientReaper {
    max_updates_to_keep: NonZeroUsize,
}

impl DevelopmentClientReaper {
    #[must_use]
    pub fn new(max_updates_to_keep: NonZeroUsize) -> Self {
        Self {
            max_updates_to_keep,
        }
    }

    #[must_use]
    pub fn max_updates_to_keep(&self) -> NonZeroUsize {
        self.max_updates_to_keep
    }
}

impl Default for DevelopmentClientReaper {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPDATES_TO_KEEP)
    }
}

impl ReaperSelectionPolicy for DevelopmentClientReaper {
    fn select_updates_to_delete(
        &self,
        updates: &[Update],
        launched_update: Option<&Update>,
        _filters: Option<&ManifestFilters>,
    ) -> Vec<Update> {
        let Some(launched) = launched_update else {
            return Vec::new();
        };

        let mut by_access: Vec<&Update> = updates.iter().collect();
        by_access.sort_by_key(|u| (u.last_accessed, u.recency()));

        let capacity = self.max_updates_to_keep.get();
        if by_access.len() <= capacity {
            return Vec::new();
        }

        let excess = by_access.len() - capacity;
        by_access
            .into_iter()
            .take(excess)
            .filter(|u| u.id != launched.id)
            .cloned()
            .collect()
    }
}
