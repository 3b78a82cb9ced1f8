#![forbid(unsafe_code)]

use std::sync::Arc;

use async_trait::async_trait;
use updraft_core::{Asset, ManifestFilters, Update, UpdateId, UpdateStatus};

use crate::error::StoreResult;

/// Durable storage of update and asset records.
///
/// ## Normative
/// - Every call is serialized against every other call on the same store instance; a caller
///   never observes a half-applied mutation.
/// - Calls hold the store only for the duration of the call; callers never keep it locked
///   across unrelated I/O.
/// - `launchable_updates` returns updates of the given scope and runtime version whose status
///   is launchable and which have not failed to launch without ever succeeding.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn launchable_updates(
        &self,
        scope_key: &str,
        runtime_version: &str,
    ) -> StoreResult<Vec<Update>>;

    async fn manifest_filters(&self, scope_key: &str) -> StoreResult<Option<ManifestFilters>>;

    async fn set_manifest_filters(
        &self,
        scope_key: &str,
        filters: Option<ManifestFilters>,
    ) -> StoreResult<()>;

    /// Stamp `last_accessed` with the current time.
    async fn mark_accessed(&self, id: UpdateId) -> StoreResult<()>;

    /// Replace the stored row with the same key.
    async fn update_asset(&self, asset: Asset) -> StoreResult<()>;

    async fn all_update_ids(&self, status: UpdateStatus) -> StoreResult<Vec<UpdateId>>;

    async fn all_updates(&self) -> StoreResult<Vec<Update>>;

    async fn update(&self, id: UpdateId) -> StoreResult<Option<Update>>;

    async fn add_update(&self, update: Update) -> StoreResult<()>;

    /// Insert or replace asset rows and link them to `update_id`.
    async fn add_assets(&self, update_id: UpdateId, assets: Vec<Asset>) -> StoreResult<()>;

    async fn assets_for_update(&self, update_id: UpdateId) -> StoreResult<Vec<Asset>>;

    async fn set_update_status(&self, id: UpdateId, status: UpdateStatus) -> StoreResult<()>;

    async fn increment_successful_launch_count(&self, id: UpdateId) -> StoreResult<()>;

    async fn increment_failed_launch_count(&self, id: UpdateId) -> StoreResult<()>;

    /// Delete update rows and their asset links. Asset rows stay until
    /// [`delete_unused_assets`](Self::delete_unused_assets).
    async fn delete_updates(&self, ids: &[UpdateId]) -> StoreResult<()>;

    /// Delete asset rows no update needs any more and return them so their files can be
    /// removed. Rows sharing an on-disk file with a still-needed row are kept.
    async fn delete_unused_assets(&self) -> StoreResult<Vec<Asset>>;
}

macro_rules! forward_record_store {
    ($($method:ident($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
        #[async_trait]
        impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
            $(
                async fn $method(&self, $($arg: $ty),*) -> $ret {
                    (**self).$method($($arg),*).await
                }
            )*
        }
    };
}

forward_record_store! {
    launchable_updates(scope_key: &str, runtime_version: &str) -> StoreResult<Vec<Update>>;
    manifest_filters(scope_key: &str) -> StoreResult<Option<ManifestFilters>>;
    set_manifest_filters(scope_key: &str, filters: Option<ManifestFilters>) -> StoreResult<()>;
    mark_accessed(id: UpdateId) -> StoreResult<()>;
    update_asset(asset: Asset) -> StoreResult<()>;
    all_update_ids(status: UpdateStatus) -> StoreResult<Vec<UpdateId>>;
    all_updates() -> StoreResult<Vec<Update>>;
    update(id: UpdateId) -> StoreResult<Option<Update>>;
    add_update(update: Update) -> StoreResult<()>;
    add_assets(update_id: UpdateId, assets: Vec<Asset>) -> StoreResult<()>;
    assets_for_update(update_id: UpdateId) -> StoreResult<Vec<Asset>>;
    set_update_status(id: UpdateId, status: UpdateStatus) -> StoreResult<()>;
    increment_successful_launch_count(id: UpdateId) -> StoreResult<()>;
    increment_failed_launch_count(id: UpdateId) -> StoreResult<()>;
    delete_updates(ids: &[UpdateId]) -> StoreResult<()>;
    delete_unused_assets() -> StoreResult<Vec<Asset>>;
}
