#![forbid(unsafe_code)]

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{CoreError, CoreResult};

/// Opaque update identifier (UUID).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateId(Uuid);

impl UpdateId {
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UpdateId {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CoreError::InvalidUpdateId(format!("{s}: {e}")))
    }
}

/// Lifecycle status of an update.
///
/// Only `Embedded`, `Ready` and `Development` are ever launchable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// Shipped inside the running binary.
    Embedded,
    /// Served by a development transport (e.g. a live bundler).
    Development,
    /// Manifest processed, assets not yet complete.
    Pending,
    /// All assets downloaded.
    Ready,
    Errored,
}

impl UpdateStatus {
    #[must_use]
    pub fn is_launchable(self) -> bool {
        matches!(self, Self::Embedded | Self::Ready | Self::Development)
    }
}

/// Manifest metadata used by manifest filters (e.g. `{"branchName": "rollout"}`).
pub type Metadata = BTreeMap<String, String>;

/// One versioned, launchable bundle of code and assets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub id: UpdateId,
    pub scope_key: String,
    pub commit_time: DateTime<Utc>,
    pub runtime_version: String,
    /// `None` for bare/legacy manifests; such updates match every filter.
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub status: UpdateStatus,
    pub last_accessed: DateTime<Utc>,
    #[serde(default)]
    pub successful_launch_count: u32,
    #[serde(default)]
    pub failed_launch_count: u32,
}

impl Update {
    /// A `Pending` update whose `last_accessed` starts at `commit_time`.
    pub fn new<S, R>(id: UpdateId, scope_key: S, commit_time: DateTime<Utc>, runtime_version: R) -> Self
    where
        S: Into<String>,
        R: Into<String>,
    {
        Self {
            id,
            scope_key: scope_key.into(),
            commit_time,
            runtime_version: runtime_version.into(),
            metadata: None,
            status: UpdateStatus::Pending,
            last_accessed: commit_time,
            successful_launch_count: 0,
            failed_launch_count: 0,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: UpdateStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    #[must_use]
    pub fn with_last_accessed(mut self, last_accessed: DateTime<Utc>) -> Self {
        self.last_accessed = last_accessed;
        self
    }

    /// Position of this update in the deterministic recency order.
    #[must_use]
    pub fn recency(&self) -> Recency {
        Recency {
            commit_time: self.commit_time,
            id: self.id,
        }
    }

    #[must_use]
    pub fn is_newer_than(&self, other: &Update) -> bool {
        self.recency() > other.recency()
    }

    /// Status is launchable and the update has not failed without ever succeeding.
    #[must_use]
    pub fn is_launchable(&self) -> bool {
        self.status.is_launchable()
            && (self.successful_launch_count > 0 || self.failed_launch_count == 0)
    }
}

/// Total order over updates: `commit_time`, then `id`.
///
/// Equal commit times never depend on timestamp jitter; the id breaks the tie.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Recency {
    commit_time: DateTime<Utc>,
    id: UpdateId,
}
