mod common;

use std::{sync::Arc, time::Duration};

use common::{BrokenStore, EMBEDDED_BUNDLE, Harness, ReadOnlyStore};
use rstest::rstest;
use updraft_core::{ManifestFilters, UpdateStatus};
use updraft_launch::{
    DatabaseLauncher, EmbeddedManifest, LaunchError, LaunchState, Launcher, NoDatabaseLauncher,
};
use updraft_net::NetError;
use updraft_policy::SelectionPolicy;
use updraft_store::RecordStore;
use updraft_test_utils::{
    TEST_SCOPE, asset_url, branch_update, launch_asset, remote_asset, uid, update,
};

const BUNDLE: &[u8] = b"bundle";
const LOGO: &[u8] = b"logo";

fn embedded_manifest(n: u128) -> EmbeddedManifest {
    EmbeddedManifest {
        update: update(n, 1).with_status(UpdateStatus::Embedded),
        assets: vec![
            launch_asset("embedded-bundle", EMBEDDED_BUNDLE).with_main_bundle_filename("app.bundle"),
        ],
    }
}

fn launcher(h: &Harness) -> DatabaseLauncher {
    DatabaseLauncher::new(h.ctx(), SelectionPolicy::filter_aware())
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn launches_newest_matching_update() {
    let h = Harness::new();
    h.add(
        branch_update(1, 10, "rollout"),
        &[(launch_asset("b1", BUNDLE), BUNDLE), (remote_asset("logo", LOGO), LOGO)],
    )
    .await;
    h.add(branch_update(2, 20, "default"), &[(launch_asset("b2", BUNDLE), BUNDLE)])
        .await;
    h.store
        .set_manifest_filters(TEST_SCOPE, Some(ManifestFilters::new().with("branchName", "rollout")))
        .await
        .unwrap();
    let before = h.stored(uid(1)).await.last_accessed;

    let launcher = launcher(&h);
    let outcome = launcher.launch().await.unwrap();
    launcher.settle().await;

    assert_eq!(outcome.launched_update.id, uid(1));
    assert_eq!(outcome.launch_asset_path, Some(h.updates_dir().join("b1.js")));
    assert_eq!(outcome.asset_map.len(), 2);
    assert!(!outcome.using_embedded_assets);
    assert_eq!(launcher.state(), LaunchState::Done { success: true });
    assert!(h.stored(uid(1)).await.last_accessed > before);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn failed_bookkeeping_writes_leave_launch_successful() {
    let h = Harness::new();
    h.add(
        update(1, 10),
        &[(launch_asset("b1", BUNDLE), BUNDLE), (remote_asset("logo", LOGO), LOGO)],
    )
    .await;
    h.write_update_file("b1.js", BUNDLE);
    let before = h.stored(uid(1)).await.last_accessed;
    let store = Arc::new(ReadOnlyStore {
        inner: h.store.clone(),
    });

    let launcher = DatabaseLauncher::new(h.ctx_with_store(store), SelectionPolicy::filter_aware());
    let outcome = launcher.launch().await.unwrap();
    launcher.settle().await;

    assert_eq!(outcome.launched_update.id, uid(1));
    assert_eq!(outcome.launch_asset_path, Some(h.updates_dir().join("b1.js")));
    assert_eq!(
        outcome.asset_map.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["b1", "logo"]
    );
    assert_eq!(launcher.state(), LaunchState::Done { success: true });
    assert_eq!(h.downloader.calls(), vec![asset_url("logo")]);
    assert_eq!(h.read_update_file("logo.js"), LOGO);

    // Neither write landed.
    assert_eq!(h.stored(uid(1)).await.last_accessed, before);
    let logo = h
        .store
        .assets_for_update(uid(1))
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.key == "logo")
        .unwrap();
    assert!(logo.download_time.is_none());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn launcher_is_single_shot() {
    let h = Harness::new();
    h.add(update(1, 10), &[(launch_asset("b1", BUNDLE), BUNDLE)]).await;
    let launcher = launcher(&h);
    assert_eq!(launcher.state(), LaunchState::Idle);

    launcher.launch().await.unwrap();

    assert!(matches!(launcher.launch().await, Err(LaunchError::AlreadyLaunched)));
    assert_eq!(launcher.state(), LaunchState::Done { success: true });
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn empty_store_has_nothing_to_launch() {
    let h = Harness::new();
    let launcher = launcher(&h);

    let err = launcher.launch().await.unwrap_err();

    assert!(matches!(err, LaunchError::NoLaunchableUpdate { source: None }));
    assert_eq!(launcher.state(), LaunchState::Done { success: false });
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn unreadable_store_reports_cause() {
    let h = Harness::new();
    let launcher = DatabaseLauncher::new(
        h.ctx_with_store(Arc::new(BrokenStore)),
        SelectionPolicy::filter_aware(),
    );

    let err = launcher.launch().await.unwrap_err();

    assert_eq!(err.to_string(), "no launchable updates found");
    assert!(matches!(err, LaunchError::NoLaunchableUpdate { source: Some(_) }));
    assert!(std::error::Error::source(&err).is_some());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn everything_filtered_out_has_nothing_to_launch() {
    let h = Harness::new();
    h.add(branch_update(1, 10, "default"), &[(launch_asset("b1", BUNDLE), BUNDLE)])
        .await;
    h.store
        .set_manifest_filters(TEST_SCOPE, Some(ManifestFilters::new().with("branchName", "rollout")))
        .await
        .unwrap();

    assert!(matches!(
        launcher(&h).launch().await,
        Err(LaunchError::NoLaunchableUpdate { source: None })
    ));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn stale_embedded_rows_are_ignored() {
    // Store remembers embedded update 5, but this binary embeds update 6.
    let h = Harness::new().with_embedded(embedded_manifest(6));
    h.add(update(1, 10), &[(launch_asset("b1", BUNDLE), BUNDLE)]).await;
    h.store
        .add_update(update(5, 100).with_status(UpdateStatus::Embedded))
        .await
        .unwrap();

    let outcome = launcher(&h).launch().await.unwrap();

    assert_eq!(outcome.launched_update.id, uid(1));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn current_embedded_row_launches_from_resources() {
    let h = Harness::new().with_embedded(embedded_manifest(6));
    h.add(update(1, 10), &[(launch_asset("b1", BUNDLE), BUNDLE)]).await;
    h.store
        .add_update(update(6, 100).with_status(UpdateStatus::Embedded))
        .await
        .unwrap();

    let outcome = launcher(&h).launch().await.unwrap();

    assert_eq!(outcome.launched_update.id, uid(6));
    assert!(outcome.using_embedded_assets);
    assert!(outcome.asset_map.is_empty());
    assert_eq!(outcome.launch_asset_path, Some(h.resources_dir().join("app.bundle")));
    assert_eq!(h.downloader.call_count(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn development_updates_skip_reconciliation() {
    let h = Harness::new();
    h.store
        .add_update(update(1, 10).with_status(UpdateStatus::Development))
        .await
        .unwrap();

    let outcome = launcher(&h).launch().await.unwrap();

    assert_eq!(outcome.launched_update.status, UpdateStatus::Development);
    assert_eq!(outcome.launch_asset_path, None);
    assert_eq!(h.downloader.call_count(), 0);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn update_that_only_ever_failed_is_skipped() {
    let h = Harness::new();
    h.add(update(1, 10), &[(launch_asset("b1", BUNDLE), BUNDLE)]).await;
    h.add(update(2, 20), &[(launch_asset("b2", BUNDLE), BUNDLE)]).await;
    h.store.increment_failed_launch_count(uid(2)).await.unwrap();

    let outcome = launcher(&h).launch().await.unwrap();

    assert_eq!(outcome.launched_update.id, uid(1));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn unavailable_launch_asset_fails_the_launch() {
    let h = Harness::new();
    h.add(update(1, 10), &[(launch_asset("b1", BUNDLE), BUNDLE)]).await;
    h.downloader.fail(asset_url("b1"), NetError::Timeout);
    let launcher = launcher(&h);

    let err = launcher.launch().await.unwrap_err();

    assert!(matches!(err, LaunchError::LaunchAsset { ref key, .. } if key == "b1"));
    assert_eq!(launcher.state(), LaunchState::Done { success: false });
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn no_database_launcher_runs_embedded_update() {
    let h = Harness::new().with_embedded(embedded_manifest(6));
    let launcher = NoDatabaseLauncher::new(h.embedded_bundle());

    let outcome = launcher.launch().await.unwrap();

    assert_eq!(outcome.launched_update.id, uid(6));
    assert!(outcome.using_embedded_assets);
    assert_eq!(outcome.launch_asset_path, Some(h.resources_dir().join("app.bundle")));
    assert!(matches!(launcher.launch().await, Err(LaunchError::AlreadyLaunched)));
}

#[rstest]
#[tokio::test]
async fn no_database_launcher_needs_embedded_update() {
    let h = Harness::new();
    let launcher = NoDatabaseLauncher::new(h.embedded_bundle());

    assert!(matches!(launcher.launch().await, Err(LaunchError::NoEmbeddedUpdate)));
    assert_eq!(launcher.state(), LaunchState::Done { success: false });
}
