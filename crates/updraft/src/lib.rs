#![forbid(unsafe_code)]

//! # Updraft
//!
//! Facade crate for the over-the-air update engine.
//!
//! ## Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use updraft::prelude::*;
//!
//! let config = UpdatesConfig::new("@owner/app", "1.0.0", "/data/updates");
//! let store = Arc::new(FileRecordStore::open("/data/updates/records.json").await?);
//! let downloader = Arc::new(HttpDownloader::retrying(NetOptions::default())?);
//! let embedded = Arc::new(DirEmbeddedBundle::open("/app/resources", &IoPool::shared()).await?);
//!
//! let controller = UpdatesController::new(LaunchContext::new(config, store, downloader, embedded));
//! let outcome = controller.start().await?;
//! run_bundle(outcome.launch_asset_path);
//! controller.mark_successful_launch().await?;
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod core {
    pub use updraft_core::*;
}

pub mod policy {
    pub use updraft_policy::*;
}

pub mod net {
    pub use updraft_net::*;
}

pub mod store {
    pub use updraft_store::*;
}

pub mod launch {
    pub use updraft_launch::*;
}

pub mod platform {
    pub use updraft_platform::*;
}

// ── Controller ──────────────────────────────────────────────────────────

mod controller;

pub use controller::UpdatesController;

// ── Prelude ─────────────────────────────────────────────────────────────

pub mod prelude {
    pub use updraft_core::{Asset, ManifestFilters, Update, UpdateId, UpdateStatus};
    pub use updraft_launch::{
        DirEmbeddedBundle, LaunchContext, LaunchError, LaunchOutcome, LaunchResult, ReaperOptions,
        UpdatesConfig,
    };
    pub use updraft_net::{Downloader, DownloaderExt, HttpDownloader, NetOptions, RetryPolicy};
    pub use updraft_platform::IoPool;
    pub use updraft_policy::SelectionPolicy;
    pub use updraft_store::{FileRecordStore, MemRecordStore, RecordStore};

    pub use crate::UpdatesController;
}
