#![forbid(unsafe_code)]

//! # updraft-launch
//!
//! Cold-start launch engine.
//!
//! 1. [`DatabaseLauncher`] queries the record store, applies the selection policy, marks the
//!    chosen update accessed and drives the [`AssetReconciler`] over its assets.
//! 2. If that fails, the caller falls back to [`NoDatabaseLauncher`], which runs the update
//!    embedded in the binary.
//! 3. After a successful launch, the [`Reaper`] deletes updates the policy no longer needs.
//!
//! ## Concurrency (normative)
//! - The store is only held for the duration of each call, never across reconciliation.
//! - Filesystem checks and copies run on the [`IoPool`](updraft_platform::IoPool).
//! - The reaper and a launch must not run at the same time; the caller sequences them.

mod background;
mod config;
mod context;
mod embedded;
mod error;
mod launcher;
mod reaper;
mod reconcile;

pub use config::{ReaperOptions, UpdatesConfig};
pub use context::LaunchContext;
pub use embedded::{DirEmbeddedBundle, EMBEDDED_MANIFEST_FILENAME, EmbeddedBundle, EmbeddedManifest};
pub use error::{AssetError, AssetResult, LaunchError, LaunchResult};
pub use launcher::{DatabaseLauncher, LaunchOutcome, LaunchState, Launcher, NoDatabaseLauncher};
pub use reaper::{ReapReport, Reaper};
pub use reconcile::{AssetReconciler, AssetSource, ReconcileReport};
