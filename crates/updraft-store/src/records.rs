#![forbid(unsafe_code)]

//! In-memory record tables shared by every [`RecordStore`](crate::RecordStore) implementation.
//!
//! Pure data manipulation: no locking and no I/O. Stores wrap a `Records` in their own lock and
//! persist it however they like.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use updraft_core::{Asset, ManifestFilters, Update, UpdateId, UpdateStatus};

use crate::error::{StoreError, StoreResult};

pub(crate) const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct Records {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    updates: BTreeMap<UpdateId, Update>,
    /// Asset rows keyed by asset key; one row may be shared by several updates.
    #[serde(default)]
    assets: BTreeMap<String, Asset>,
    /// Update -> keys of the assets it needs.
    #[serde(default)]
    links: BTreeMap<UpdateId, BTreeSet<String>>,
    /// Scope -> filters from the most recent manifest response.
    #[serde(default)]
    filters: BTreeMap<String, ManifestFilters>,
}

impl Records {
    pub(crate) fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            ..Self::default()
        }
    }

    pub(crate) fn add_update(&mut self, update: Update) -> StoreResult<()> {
        if self.updates.contains_key(&update.id) {
            return Err(StoreError::UpdateExists(update.id));
        }
        self.links.entry(update.id).or_default();
        self.updates.insert(update.id, update);
        Ok(())
    }

    /// Insert or replace asset rows by key and link them to `update_id`.
    pub(crate) fn add_assets(&mut self, update_id: UpdateId, assets: Vec<Asset>) -> StoreResult<()> {
        if !self.updates.contains_key(&update_id) {
            return Err(StoreError::UpdateNotFound(update_id));
        }
        // Validate every key before touching anything.
        for asset in &assets {
            asset.filename()?;
        }
        let links = self.links.entry(update_id).or_default();
        for asset in assets {
            links.insert(asset.key.clone());
            self.assets.insert(asset.key.clone(), asset);
        }
        Ok(())
    }

    pub(crate) fn assets_for_update(&self, update_id: UpdateId) -> StoreResult<Vec<Asset>> {
        if !self.updates.contains_key(&update_id) {
            return Err(StoreError::UpdateNotFound(update_id));
        }
        Ok(self
            .links
            .get(&update_id)
            .into_iter()
            .flatten()
            .filter_map(|key| self.assets.get(key))
            .cloned()
            .collect())
    }

    pub(crate) fn update(&self, id: UpdateId) -> Option<Update> {
        self.updates.get(&id).cloned()
    }

    pub(crate) fn all_updates(&self) -> Vec<Update> {
        self.updates.values().cloned().collect()
    }

    pub(crate) fn all_update_ids(&self, status: UpdateStatus) -> Vec<UpdateId> {
        self.updates
            .values()
            .filter(|u| u.status == status)
            .map(|u| u.id)
            .collect()
    }

    pub(crate) fn launchable_updates(&self, scope_key: &str, runtime_version: &str) -> Vec<Update> {
        self.updates
            .values()
            .filter(|u| {
                u.scope_key == scope_key && u.runtime_version == runtime_version && u.is_launchable()
            })
            .cloned()
            .collect()
    }

    pub(crate) fn manifest_filters(&self, scope_key: &str) -> Option<ManifestFilters> {
        self.filters.get(scope_key).cloned()
    }

    pub(crate) fn set_manifest_filters(&mut self, scope_key: &str, filters: Option<ManifestFilters>) {
        match filters {
            Some(filters) => {
                self.filters.insert(scope_key.to_string(), filters);
            }
            None => {
                self.filters.remove(scope_key);
            }
        }
    }

    pub(crate) fn mark_accessed(&mut self, id: UpdateId, at: DateTime<Utc>) -> StoreResult<()> {
        self.update_mut(id)?.last_accessed = at;
        Ok(())
    }

    pub(crate) fn set_status(&mut self, id: UpdateId, status: UpdateStatus) -> StoreResult<()> {
        self.update_mut(id)?.status = status;
        Ok(())
    }

    pub(crate) fn increment_successful_launch_count(&mut self, id: UpdateId) -> StoreResult<()> {
        let update = self.update_mut(id)?;
        update.successful_launch_count = update.successful_launch_count.saturating_add(1);
        Ok(())
    }

    pub(crate) fn increment_failed_launch_count(&mut self, id: UpdateId) -> StoreResult<()> {
        let update = self.update_mut(id)?;
        update.failed_launch_count = update.failed_launch_count.saturating_add(1);
        Ok(())
    }

    pub(crate) fn update_asset(&mut self, asset: Asset) -> StoreResult<()> {
        let row = self
            .assets
            .get_mut(&asset.key)
            .ok_or_else(|| StoreError::AssetNotFound(asset.key.clone()))?;
        *row = asset;
        Ok(())
    }

    /// Remove the given updates and their links. Unknown ids are ignored.
    pub(crate) fn delete_updates(&mut self, ids: &[UpdateId]) {
        for id in ids {
            self.updates.remove(id);
            self.links.remove(id);
        }
    }

    /// Remove asset rows no update links to any more and return them.
    ///
    /// A row survives if a still-linked row maps to the same on-disk file: deleting its file
    /// would break the update that still needs it.
    pub(crate) fn delete_unused_assets(&mut self) -> Vec<Asset> {
        let referenced: HashSet<&String> = self.links.values().flatten().collect();
        let live_files: HashSet<String> = self
            .assets
            .values()
            .filter(|a| referenced.contains(&a.key))
            .filter_map(|a| a.filename().ok())
            .collect();

        let unused: Vec<String> = self
            .assets
            .values()
            .filter(|a| !referenced.contains(&a.key))
            .filter(|a| a.filename().is_ok_and(|f| !live_files.contains(&f)))
            .map(|a| a.key.clone())
            .collect();

        unused
            .iter()
            .filter_map(|key| self.assets.remove(key))
            .collect()
    }

    fn update_mut(&mut self, id: UpdateId) -> StoreResult<&mut Update> {
        self.updates
            .get_mut(&id)
            .ok_or(StoreError::UpdateNotFound(id))
    }
}

/// Implements [`RecordStore`](crate::RecordStore) for a type exposing
/// `async fn read(&self, impl FnOnce(&Records) -> R) -> StoreResult<R>` and
/// `async fn write(&self, impl FnOnce(&mut Records) -> StoreResult<R>) -> StoreResult<R>`.
macro_rules! impl_record_store {
    ($store:ty) => {
        #[async_trait::async_trait]
        impl $crate::RecordStore for $store {
            async fn launchable_updates(
                &self,
                scope_key: &str,
                runtime_version: &str,
            ) -> $crate::StoreResult<Vec<updraft_core::Update>> {
                self.read(|r| r.launchable_updates(scope_key, runtime_version))
                    .await
            }

            async fn manifest_filters(
                &self,
                scope_key: &str,
            ) -> $crate::StoreResult<Option<updraft_core::ManifestFilters>> {
                self.read(|r| r.manifest_filters(scope_key)).await
            }

            async fn set_manifest_filters(
                &self,
                scope_key: &str,
                filters: Option<updraft_core::ManifestFilters>,
            ) -> $crate::StoreResult<()> {
                self.write(|r| {
                    r.set_manifest_filters(scope_key, filters);
                    Ok(())
                })
                .await
            }

            async fn mark_accessed(&self, id: updraft_core::UpdateId) -> $crate::StoreResult<()> {
                let now = chrono::Utc::now();
                self.write(|r| r.mark_accessed(id, now)).await
            }

            async fn update_asset(&self, asset: updraft_core::Asset) -> $crate::StoreResult<()> {
                self.write(|r| r.update_asset(asset)).await
            }

            async fn all_update_ids(
                &self,
                status: updraft_core::UpdateStatus,
            ) -> $crate::StoreResult<Vec<updraft_core::UpdateId>> {
                self.read(|r| r.all_update_ids(status)).await
            }

            async fn all_updates(&self) -> $crate::StoreResult<Vec<updraft_core::Update>> {
                self.read(|r| r.all_updates()).await
            }

            async fn update(
                &self,
                id: updraft_core::UpdateId,
            ) -> $crate::StoreResult<Option<updraft_core::Update>> {
                self.read(|r| r.update(id)).await
            }

            async fn add_update(&self, update: updraft_core::Update) -> $crate::StoreResult<()> {
                self.write(|r| r.add_update(update)).await
            }

            async fn add_assets(
                &self,
                update_id: updraft_core::UpdateId,
                assets: Vec<updraft_core::Asset>,
            ) -> $crate::StoreResult<()> {
                self.write(|r| r.add_assets(update_id, assets)).await
            }

            async fn assets_for_update(
                &self,
                update_id: updraft_core::UpdateId,
            ) -> $crate::StoreResult<Vec<updraft_core::Asset>> {
                Ok(self.read(|r| r.assets_for_update(update_id)).await??)
            }

            async fn set_update_status(
                &self,
                id: updraft_core::UpdateId,
                status: updraft_core::UpdateStatus,
            ) -> $crate::StoreResult<()> {
                self.write(|r| r.set_status(id, status)).await
            }

            async fn increment_successful_launch_count(
                &self,
                id: updraft_core::UpdateId,
            ) -> $crate::StoreResult<()> {
                self.write(|r| r.increment_successful_launch_count(id)).await
            }

            async fn increment_failed_launch_count(
                &self,
                id: updraft_core::UpdateId,
            ) -> $crate::StoreResult<()> {
                self.write(|r| r.increment_failed_launch_count(id)).await
            }

            async fn delete_updates(&self, ids: &[updraft_core::UpdateId]) -> $crate::StoreResult<()> {
                self.write(|r| {
                    r.delete_updates(ids);
                    Ok(())
                })
                .await
            }

            async fn delete_unused_assets(&self) -> $crate::StoreResult<Vec<updraft_core::Asset>> {
                self.write(|r| Ok(r.delete_unused_assets())).await
            }
        }
    };
}

pub(crate) use impl_record_store;
