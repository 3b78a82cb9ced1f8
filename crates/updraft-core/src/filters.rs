#![forbid(unsafe_code)]

//! Manifest filter matching.
//!
//! Filters are a key/value predicate over update metadata (e.g. `{"branchname": "rollout"}`).
//!
//! ## Normative
//! - No filters: every update matches.
//! - No metadata: the update matches (bare/legacy manifests).
//! - Otherwise every filter key that is present in the metadata must carry an equal value.
//!   Keys compare case-insensitively; values compare exactly.
//! - A filter key missing from the metadata never blocks a match (open world).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::update::Update;

/// Case-insensitive key/value filter map supplied by the update server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ManifestFilters {
    // Keys are stored lowercased.
    inner: BTreeMap<String, String>,
}

impl ManifestFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: AsRef<str>, V: Into<String>>(&mut self, key: K, value: V) {
        self.inner.insert(key.as_ref().to_lowercase(), value.into());
    }

    #[must_use]
    pub fn with<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(&key.to_lowercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ManifestFilters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = Self::new();
        for (k, v) in iter {
            filters.insert(k, v);
        }
        filters
    }
}

impl From<BTreeMap<String, String>> for ManifestFilters {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<ManifestFilters> for BTreeMap<String, String> {
    fn from(filters: ManifestFilters) -> Self {
        filters.inner
    }
}

/// Does `update` pass `filters`?
pub fn matches(update: &Update, filters: Option<&ManifestFilters>) -> bool {
    let Some(filters) = filters else {
        return true;
    };
    let Some(metadata) = update.metadata.as_ref() else {
        return true;
    };

    filters.iter().all(|(key, expected)| {
        metadata
            .iter()
            .find(|(field, _)| field.to_lowercase() == key)
            .is_none_or(|(_, actual)| actual == expected)
    })
}
