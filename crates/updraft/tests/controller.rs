use std::{sync::Arc, time::Duration};

use rstest::rstest;
use tempfile::TempDir;
use updraft::{launch::EmbeddedManifest, prelude::*};
use updraft_test_utils::{
    FakeDownloader, TEST_RUNTIME, TEST_SCOPE, branch_update, init_tracing, launch_asset, uid,
    update,
};

const BUNDLE: &[u8] = b"bundle";

struct Env {
    dir: TempDir,
    store: Arc<MemRecordStore>,
    downloader: Arc<FakeDownloader>,
    embedded: Option<EmbeddedManifest>,
}

impl Env {
    fn new() -> Self {
        init_tracing();
        Self {
            dir: tempfile::tempdir().unwrap(),
            store: Arc::new(MemRecordStore::new()),
            downloader: Arc::new(FakeDownloader::new()),
            embedded: None,
        }
    }

    fn with_embedded(mut self) -> Self {
        self.embedded = Some(EmbeddedManifest {
            update: update(100, 1).with_status(UpdateStatus::Embedded),
            assets: vec![launch_asset("embedded", BUNDLE).with_main_bundle_filename("app.bundle")],
        });
        self
    }

    async fn add(&self, update: Update) {
        let id = update.id;
        let asset = launch_asset(&format!("bundle-{}", id.as_uuid().as_u128()), BUNDLE);
        if let Some(url) = &asset.url {
            self.downloader.serve(url.clone(), BUNDLE);
        }
        self.store.add_update(update).await.unwrap();
        self.store.add_assets(id, vec![asset]).await.unwrap();
    }

    fn controller(&self) -> UpdatesController {
        let config = UpdatesConfig::new(TEST_SCOPE, TEST_RUNTIME, self.dir.path().join("updates"));
        let embedded = Arc::new(DirEmbeddedBundle::from_parts(
            self.dir.path().join("resources"),
            self.embedded.clone(),
        ));
        UpdatesController::new(LaunchContext::new(
            config,
            self.store.clone(),
            self.downloader.clone(),
            embedded,
        ))
    }
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn database_launch_then_reap() {
    let env = Env::new();
    for (n, secs) in [(1, 10), (2, 20), (3, 30)] {
        env.add(update(n, secs)).await;
    }
    let controller = env.controller();

    let outcome = controller.start().await.unwrap();
    let report = controller.wait_for_reaper().await.unwrap();

    assert_eq!(outcome.launched_update.id, uid(3));
    assert_eq!(controller.launched_update().map(|u| u.id), Some(uid(3)));
    assert_eq!(controller.launch_asset_path(), outcome.launch_asset_path);
    assert_eq!(controller.asset_map().len(), 1);
    assert!(!controller.is_emergency_launch());
    assert_eq!(report.deleted_updates, vec![uid(1)]);
    assert!(env.store.update(uid(2)).await.unwrap().is_some());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn falls_back_to_embedded_update() {
    let env = Env::new().with_embedded();
    let controller = env.controller();

    let outcome = controller.start().await.unwrap();

    assert_eq!(outcome.launched_update.id, uid(100));
    assert!(outcome.using_embedded_assets);
    assert!(controller.is_emergency_launch());
    assert_eq!(
        controller.emergency_launch_reason().as_deref(),
        Some("no launchable updates found")
    );
    assert!(controller.wait_for_reaper().await.is_none());

    controller.mark_successful_launch().await.unwrap();
    assert!(env.store.all_updates().await.unwrap().is_empty());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn database_error_is_reported_when_fallback_fails() {
    let env = Env::new();
    let controller = env.controller();

    let err = controller.start().await.unwrap_err();

    assert!(matches!(err, LaunchError::NoLaunchableUpdate { .. }));
    assert!(controller.launched_update().is_none());
    assert!(controller.asset_map().is_empty());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn controller_launches_once() {
    let env = Env::new();
    env.add(update(1, 10)).await;
    let controller = env.controller();

    controller.start().await.unwrap();

    assert!(matches!(controller.start().await, Err(LaunchError::AlreadyLaunched)));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn failed_launch_steers_next_start_to_older_update() {
    let env = Env::new();
    env.add(update(1, 10)).await;
    env.add(update(2, 20)).await;

    let first = env.controller();
    assert_eq!(first.start().await.unwrap().launched_update.id, uid(2));
    first.wait_for_reaper().await;
    first.mark_failed_launch().await.unwrap();
    assert_eq!(
        env.store.update(uid(2)).await.unwrap().unwrap().failed_launch_count,
        1
    );

    let second = env.controller();
    assert_eq!(second.start().await.unwrap().launched_update.id, uid(1));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn successful_launch_is_counted() {
    let env = Env::new();
    env.add(update(1, 10)).await;
    let controller = env.controller();
    controller.start().await.unwrap();

    controller.mark_successful_launch().await.unwrap();

    let stored = env.store.update(uid(1)).await.unwrap().unwrap();
    assert_eq!(stored.successful_launch_count, 1);
}

#[rstest]
#[case::newer(update(3, 30), true)]
#[case::older(update(3, 5), false)]
#[case::same_commit_time(update(3, 20), false)]
#[case::filtered_out(branch_update(3, 30, "default"), false)]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn new_update_is_judged_against_launched_one(#[case] candidate: Update, #[case] expected: bool) {
    let env = Env::new();
    env.add(branch_update(2, 20, "rollout")).await;
    env.store
        .set_manifest_filters(TEST_SCOPE, Some(ManifestFilters::new().with("branchName", "rollout")))
        .await
        .unwrap();
    let controller = env.controller();
    controller.start().await.unwrap();

    assert_eq!(
        controller.should_load_new_update(Some(&candidate)).await.unwrap(),
        expected
    );
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn next_selection_policy_drives_the_reaper() {
    let env = Env::new();
    for (n, secs) in [(1, 10), (2, 20), (3, 30)] {
        env.add(update(n, secs)).await;
    }
    let controller = env.controller();
    controller.set_next_selection_policy(SelectionPolicy::development_client(
        std::num::NonZeroUsize::MIN,
    ));

    controller.start().await.unwrap();
    let report = controller.wait_for_reaper().await.unwrap();

    assert_eq!(report.deleted_updates, vec![uid(1), uid(2)]);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn reset_restores_configured_policy() {
    let env = Env::new();
    for (n, secs) in [(1, 10), (2, 20), (3, 30)] {
        env.add(update(n, secs)).await;
    }
    let controller = env.controller();
    controller.set_next_selection_policy(SelectionPolicy::development_client(
        std::num::NonZeroUsize::MIN,
    ));
    controller.reset_selection_policy();

    controller.start().await.unwrap();
    let report = controller.wait_for_reaper().await.unwrap();

    assert_eq!(report.deleted_updates, vec![uid(1)]);
}
