#![allow(dead_code)]

use std::{
    io,
    path::PathBuf,
    sync::Arc,
};

use async_trait::async_trait;
use tempfile::TempDir;
use updraft_core::{Asset, ManifestFilters, Update, UpdateId, UpdateStatus};
use updraft_launch::{DirEmbeddedBundle, EmbeddedManifest, LaunchContext, UpdatesConfig};
use updraft_store::{MemRecordStore, RecordStore, StoreError, StoreResult};
use updraft_test_utils::{FakeDownloader, TEST_RUNTIME, TEST_SCOPE, init_tracing};

pub const EMBEDDED_BUNDLE: &[u8] = b"embedded bundle";

/// Temp updates/resources directories, an in-memory store and a scripted downloader.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<MemRecordStore>,
    pub downloader: Arc<FakeDownloader>,
    pub embedded: Option<EmbeddedManifest>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("updates")).unwrap();
        std::fs::create_dir_all(dir.path().join("resources")).unwrap();
        Self {
            dir,
            store: Arc::new(MemRecordStore::new()),
            downloader: Arc::new(FakeDownloader::new()),
            embedded: None,
        }
    }

    pub fn updates_dir(&self) -> PathBuf {
        self.dir.path().join("updates")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.dir.path().join("resources")
    }

    /// Ship `manifest` as the binary's embedded update.
    pub fn with_embedded(mut self, manifest: EmbeddedManifest) -> Self {
        self.embedded = Some(manifest);
        self
    }

    pub fn write_resource(&self, name: &str, body: &[u8]) {
        std::fs::write(self.resources_dir().join(name), body).unwrap();
    }

    pub fn write_update_file(&self, name: &str, body: &[u8]) {
        std::fs::write(self.updates_dir().join(name), body).unwrap();
    }

    pub fn read_update_file(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.updates_dir().join(name)).unwrap()
    }

    pub fn config(&self) -> UpdatesConfig {
        UpdatesConfig::new(TEST_SCOPE, TEST_RUNTIME, self.updates_dir())
    }

    pub fn embedded_bundle(&self) -> Arc<DirEmbeddedBundle> {
        Arc::new(DirEmbeddedBundle::from_parts(
            self.resources_dir(),
            self.embedded.clone(),
        ))
    }

    pub fn ctx(&self) -> LaunchContext {
        self.ctx_with_store(self.store.clone())
    }

    pub fn ctx_with_store(&self, store: Arc<dyn RecordStore>) -> LaunchContext {
        LaunchContext::new(
            self.config(),
            store,
            self.downloader.clone(),
            self.embedded_bundle(),
        )
    }

    /// Store `update` with `assets` and serve every asset body from the fake CDN.
    pub async fn add(&self, update: Update, assets: &[(Asset, &[u8])]) {
        let id = update.id;
        self.store.add_update(update).await.unwrap();
        for (asset, body) in assets {
            if let Some(url) = &asset.url {
                self.downloader.serve(url.clone(), body.to_vec());
            }
        }
        self.store
            .add_assets(id, assets.iter().map(|(a, _)| a.clone()).collect())
            .await
            .unwrap();
    }

    pub async fn stored(&self, id: UpdateId) -> Update {
        self.store.update(id).await.unwrap().unwrap()
    }
}

/// Store whose every call fails as if the backing file were unreadable.
pub struct BrokenStore;

fn broken<T>() -> StoreResult<T> {
    Err(StoreError::Io(io::Error::other("database disk image is malformed")))
}

#[async_trait]
impl RecordStore for BrokenStore {
    async fn launchable_updates(&self, _: &str, _: &str) -> StoreResult<Vec<Update>> {
        broken()
    }
    async fn manifest_filters(&self, _: &str) -> StoreResult<Option<ManifestFilters>> {
        broken()
    }
    async fn set_manifest_filters(&self, _: &str, _: Option<ManifestFilters>) -> StoreResult<()> {
        broken()
    }
    async fn mark_accessed(&self, _: UpdateId) -> StoreResult<()> {
        broken()
    }
    async fn update_asset(&self, _: Asset) -> StoreResult<()> {
        broken()
    }
    async fn all_update_ids(&self, _: UpdateStatus) -> StoreResult<Vec<UpdateId>> {
        broken()
    }
    async fn all_updates(&self) -> StoreResult<Vec<Update>> {
        broken()
    }
    async fn update(&self, _: UpdateId) -> StoreResult<Option<Update>> {
        broken()
    }
    async fn add_update(&self, _: Update) -> StoreResult<()> {
        broken()
    }
    async fn add_assets(&self, _: UpdateId, _: Vec<Asset>) -> StoreResult<()> {
        broken()
    }
    async fn assets_for_update(&self, _: UpdateId) -> StoreResult<Vec<Asset>> {
        broken()
    }
    async fn set_update_status(&self, _: UpdateId, _: UpdateStatus) -> StoreResult<()> {
        broken()
    }
    async fn increment_successful_launch_count(&self, _: UpdateId) -> StoreResult<()> {
        broken()
    }
    async fn increment_failed_launch_count(&self, _: UpdateId) -> StoreResult<()> {
        broken()
    }
    async fn delete_updates(&self, _: &[UpdateId]) -> StoreResult<()> {
        broken()
    }
    async fn delete_unused_assets(&self) -> StoreResult<Vec<Asset>> {
        broken()
    }
}

/// Store that reads through to `inner` but rejects the launcher's bookkeeping writes.
pub struct ReadOnlyStore {
    pub inner: Arc<MemRecordStore>,
}

fn read_only<T>() -> StoreResult<T> {
    Err(StoreError::Io(io::Error::other("attempt to write a readonly database")))
}

#[async_trait]
impl RecordStore for ReadOnlyStore {
    async fn launchable_updates(&self, scope: &str, runtime: &str) -> StoreResult<Vec<Update>> {
        self.inner.launchable_updates(scope, runtime).await
    }
    async fn manifest_filters(&self, scope: &str) -> StoreResult<Option<ManifestFilters>> {
        self.inner.manifest_filters(scope).await
    }
    async fn set_manifest_filters(
        &self,
        scope: &str,
        filters: Option<ManifestFilters>,
    ) -> StoreResult<()> {
        self.inner.set_manifest_filters(scope, filters).await
    }
    async fn mark_accessed(&self, _: UpdateId) -> StoreResult<()> {
        read_only()
    }
    async fn update_asset(&self, _: Asset) -> StoreResult<()> {
        read_only()
    }
    async fn all_update_ids(&self, status: UpdateStatus) -> StoreResult<Vec<UpdateId>> {
        self.inner.all_update_ids(status).await
    }
    async fn all_updates(&self) -> StoreResult<Vec<Update>> {
        self.inner.all_updates().await
    }
    async fn update(&self, id: UpdateId) -> StoreResult<Option<Update>> {
        self.inner.update(id).await
    }
    async fn add_update(&self, update: Update) -> StoreResult<()> {
        self.inner.add_update(update).await
    }
    async fn add_assets(&self, id: UpdateId, assets: Vec<Asset>) -> StoreResult<()> {
        self.inner.add_assets(id, assets).await
    }
    async fn assets_for_update(&self, id: UpdateId) -> StoreResult<Vec<Asset>> {
        self.inner.assets_for_update(id).await
    }
    async fn set_update_status(&self, id: UpdateId, status: UpdateStatus) -> StoreResult<()> {
        self.inner.set_update_status(id, status).await
    }
    async fn increment_successful_launch_count(&self, id: UpdateId) -> StoreResult<()> {
        self.inner.increment_successful_launch_count(id).await
    }
    async fn increment_failed_launch_count(&self, id: UpdateId) -> StoreResult<()> {
        self.inner.increment_failed_launch_count(id).await
    }
    async fn delete_updates(&self, ids: &[UpdateId]) -> StoreResult<()> {
        self.inner.delete_updates(ids).await
    }
    async fn delete_unused_assets(&self) -> StoreResult<Vec<Asset>> {
        self.inner.delete_unused_assets().await
    }
}
