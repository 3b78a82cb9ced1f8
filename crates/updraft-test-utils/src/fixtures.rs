//! Builders for updates and assets used across policy, store and launch tests.

use chrono::{DateTime, TimeZone, Utc};
use updraft_core::{Asset, ContentHash, Metadata, Update, UpdateId, UpdateStatus};
use url::Url;

pub const TEST_SCOPE: &str = "scope";
pub const TEST_RUNTIME: &str = "1.0";

/// `secs` after the Unix epoch.
///
/// # Panics
///
/// Panics if `secs` is outside chrono's representable range.
#[must_use]
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

/// Deterministic id; `n` doubles as a readable label in assertions.
#[must_use]
pub fn uid(n: u128) -> UpdateId {
    UpdateId::from_u128(n)
}

/// A `Ready` update in [`TEST_SCOPE`] / [`TEST_RUNTIME`] committed at `at(secs)`.
#[must_use]
pub fn update(n: u128, secs: i64) -> Update {
    Update::new(uid(n), TEST_SCOPE, at(secs), TEST_RUNTIME).with_status(UpdateStatus::Ready)
}

/// [`update`] with `metadata = {"branchName": branch}`.
#[must_use]
pub fn branch_update(n: u128, secs: i64, branch: &str) -> Update {
    update(n, secs).with_metadata(Metadata::from([(
        "branchName".to_string(),
        branch.to_string(),
    )]))
}

/// [`update`] last accessed at `at(accessed_secs)`.
#[must_use]
pub fn accessed_update(n: u128, secs: i64, accessed_secs: i64) -> Update {
    update(n, secs).with_last_accessed(at(accessed_secs))
}

/// Ids in iteration order, for compact assertions.
#[must_use]
pub fn ids(updates: &[Update]) -> Vec<UpdateId> {
    updates.iter().map(|u| u.id).collect()
}

/// A `js` asset served from `https://cdn.test/<key>` with the hash of `body`.
///
/// # Panics
///
/// Panics if `key` does not form a valid URL path.
#[must_use]
pub fn remote_asset(key: &str, body: &[u8]) -> Asset {
    Asset::new(key)
        .with_type("js")
        .with_url(asset_url(key))
        .with_expected_hash(ContentHash::of_bytes(body))
}

/// [`remote_asset`] flagged as the launch asset.
#[must_use]
pub fn launch_asset(key: &str, body: &[u8]) -> Asset {
    remote_asset(key, body).launch_asset()
}

/// # Panics
///
/// Panics if `key` does not form a valid URL path.
#[must_use]
pub fn asset_url(key: &str) -> Url {
    Url::parse(&format!("https://cdn.test/{key}")).expect("asset url")
}
