#![forbid(unsafe_code)]

use updraft_core::{ManifestFilters, Update, matches};

/// Decides whether a freshly fetched update should replace the running one.
pub trait LoaderSelectionPolicy: Send + Sync {
    fn should_load_new_update(
        &self,
        new_update: Option<&Update>,
        launched_update: Option<&Update>,
        filters: Option<&ManifestFilters>,
    ) -> bool;
}

/// Forward-only loading gated by manifest filters.
///
/// ## Normative
/// - A candidate that fails the filters is never loaded.
/// - A running update that fails the filters is always replaced by a matching candidate.
/// - Otherwise the candidate must be strictly newer than the running update.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilterAwareLoader;

impl LoaderSelectionPolicy for FilterAwareLoader {
    fn should_load_new_update(
        &self,
        new_update: Option<&Update>,
        launched_update: Option<&Update>,
        filters: Option<&ManifestFilters>,
    ) -> bool {
        let Some(new_update) = new_update else {
            return false;
        };
        if !matches(new_update, filters) {
            return false;
        }

        match launched_update {
            None => true,
            Some(launched) if !matches(launched, filters) => true,
            Some(launched) => new_update.commit_time > launched.commit_time,
        }
    }
}
