#![forbid(unsafe_code)]

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    errors::{CoreError, CoreResult},
    hash::ContentHash,
};

/// One file (code bundle or static resource) required by an update.
///
/// ## On-disk mapping (normative)
/// - Every asset lives at `<updates_dir>/<filename>`, where `filename` is derived from `key`
///   (plus the `asset_type` extension when known).
/// - Keys must be a single safe path segment: no separators, no `..`, not empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Stable logical identifier, unique within an update.
    pub key: String,
    /// File extension without the dot (`"js"`, `"png"`), if known.
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub url: Option<Url>,
    #[serde(default)]
    pub expected_hash: Option<ContentHash>,
    /// Name of the copy embedded in the binary's static resources, if any.
    #[serde(default)]
    pub main_bundle_filename: Option<String>,
    #[serde(default)]
    pub is_launch_asset: bool,
    #[serde(default)]
    pub extra_request_headers: BTreeMap<String, String>,
    // Populated after a successful repair.
    #[serde(default)]
    pub download_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content_hash: Option<ContentHash>,
    #[serde(default)]
    pub response_headers: Option<BTreeMap<String, String>>,
}

impl Asset {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self {
            key: key.into(),
            asset_type: None,
            url: None,
            expected_hash: None,
            main_bundle_filename: None,
            is_launch_asset: false,
            extra_request_headers: BTreeMap::new(),
            download_time: None,
            content_hash: None,
            response_headers: None,
        }
    }

    #[must_use]
    pub fn with_type<S: Into<String>>(mut self, asset_type: S) -> Self {
        self.asset_type = Some(asset_type.into());
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    #[must_use]
    pub fn with_expected_hash(mut self, hash: ContentHash) -> Self {
        self.expected_hash = Some(hash);
        self
    }

    #[must_use]
    pub fn with_main_bundle_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.main_bundle_filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn launch_asset(mut self) -> Self {
        self.is_launch_asset = true;
        self
    }

    /// File name of this asset inside the updates directory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAssetKey`] if the key is not a single safe path segment.
    pub fn filename(&self) -> CoreResult<String> {
        validate_key(&self.key)?;
        Ok(match self.asset_type.as_deref() {
            Some(ext) if !ext.is_empty() => format!("{}.{}", self.key, ext.trim_start_matches('.')),
            _ => self.key.clone(),
        })
    }

    /// Deterministic on-disk location under `updates_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidAssetKey`] if the key is not a single safe path segment.
    pub fn local_path(&self, updates_dir: &Path) -> CoreResult<PathBuf> {
        Ok(updates_dir.join(self.filename()?))
    }

    /// Record the outcome of a successful download.
    pub fn mark_downloaded(
        &mut self,
        content_hash: ContentHash,
        response_headers: BTreeMap<String, String>,
        at: DateTime<Utc>,
    ) {
        self.content_hash = Some(content_hash);
        self.response_headers = Some(response_headers);
        self.download_time = Some(at);
    }
}

fn validate_key(key: &str) -> CoreResult<()> {
    let reason = if key.is_empty() {
        "empty"
    } else if key == "." || key == ".." {
        "relative segment"
    } else if key.contains(['/', '\\']) {
        "contains a path separator"
    } else if key.contains('\0') {
        "contains NUL"
    } else {
        return Ok(());
    };
    Err(CoreError::InvalidAssetKey {
        key: key.to_string(),
        reason,
    })
}
