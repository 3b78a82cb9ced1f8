#![forbid(unsafe_code)]

//! Configuration for the launch engine.

use std::{collections::BTreeMap, num::NonZeroUsize, path::PathBuf};

use serde::{Deserialize, Serialize};
use updraft_net::Headers;
use updraft_policy::{DEFAULT_MAX_UPDATES_TO_KEEP, SelectionPolicy};

use crate::error::{LaunchError, LaunchResult};

/// Which retention strategy the reaper applies after a launch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReaperOptions {
    /// Keep one older fallback per the manifest filters (production).
    #[default]
    FilterAware,
    /// Keep the `max_updates_to_keep` most recently accessed updates, ignoring filters.
    DevelopmentClient {
        #[serde(default = "default_max_updates_to_keep")]
        max_updates_to_keep: NonZeroUsize,
    },
}

fn default_max_updates_to_keep() -> NonZeroUsize {
    DEFAULT_MAX_UPDATES_TO_KEEP
}

impl ReaperOptions {
    #[must_use]
    pub fn selection_policy(self) -> SelectionPolicy {
        match self {
            Self::FilterAware => SelectionPolicy::filter_aware(),
            Self::DevelopmentClient {
                max_updates_to_keep,
            } => SelectionPolicy::development_client(max_updates_to_keep),
        }
    }
}

/// Everything a launcher needs to know about the running binary and its update storage.
///
/// # Example
///
/// ```ignore
/// let config = UpdatesConfig::new("@owner/app", "1.0.0", "/data/updates")
///     .with_has_embedded_update(true)
///     .with_request_header("expo-channel-name", "production");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatesConfig {
    /// Namespace isolating this app's updates from any other app sharing the store.
    pub scope_key: String,
    /// Compatibility tag of the running binary.
    pub runtime_version: String,
    /// Directory holding one file per asset.
    pub updates_dir: PathBuf,
    /// Whether the binary ships an embedded update to fall back to.
    #[serde(default = "default_true")]
    pub has_embedded_update: bool,
    /// Headers added to every asset request.
    #[serde(default)]
    pub request_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub reaper: ReaperOptions,
}

fn default_true() -> bool {
    true
}

impl UpdatesConfig {
    pub fn new<S, R, P>(scope_key: S, runtime_version: R, updates_dir: P) -> Self
    where
        S: Into<String>,
        R: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            scope_key: scope_key.into(),
            runtime_version: runtime_version.into(),
            updates_dir: updates_dir.into(),
            has_embedded_update: true,
            request_headers: BTreeMap::new(),
            reaper: ReaperOptions::default(),
        }
    }

    /// Parse a JSON configuration shipped next to the binary.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Config`] if the JSON is malformed or misses required fields.
    pub fn from_json(json: &str) -> LaunchResult<Self> {
        serde_json::from_str(json).map_err(|e| LaunchError::Config(e.to_string()))
    }

    #[must_use]
    pub fn with_has_embedded_update(mut self, has_embedded_update: bool) -> Self {
        self.has_embedded_update = has_embedded_update;
        self
    }

    #[must_use]
    pub fn with_request_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.request_headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_reaper(mut self, reaper: ReaperOptions) -> Self {
        self.reaper = reaper;
        self
    }

    pub fn request_headers(&self) -> Headers {
        Headers::from(self.request_headers.clone())
    }
}
