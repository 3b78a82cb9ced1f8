#![forbid(unsafe_code)]

//! # updraft-policy
//!
//! Pure decision logic over updates supplied by the caller on every call. No I/O, no state.
//!
//! - [`LauncherSelectionPolicy`]: which stored update to launch.
//! - [`LoaderSelectionPolicy`]: whether a freshly fetched update replaces the running one.
//! - [`ReaperSelectionPolicy`]: which stored updates may be deleted.
//!
//! [`SelectionPolicy`] bundles one of each; [`SelectionPolicy::filter_aware`] is the
//! production default.
//!
//! ## Ordering (normative)
//!
//! Updates are ordered by [`updraft_core::Recency`]: `commit_time`, then `id`. Launch
//! selection and the older/newer partition of the delete rule both use this total order.

mod launcher;
mod loader;
mod reaper;
mod selection;

pub use launcher::{FilterAwareLauncher, LauncherSelectionPolicy};
pub use loader::{FilterAwareLoader, LoaderSelectionPolicy};
pub use reaper::{
    DEFAULT_MAX_UPDATES_TO_KEEP, DevelopmentClientReaper, FilterAwareReaper,
    ReaperSelectionPolicy,
};
pub use selection::SelectionPolicy;
