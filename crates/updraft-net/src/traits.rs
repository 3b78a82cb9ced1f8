use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use updraft_core::ContentHash;
use url::Url;

use crate::{
    error::NetResult,
    retry::{DefaultRetryPolicy, RetryDownloader},
    timeout::TimeoutDownloader,
    types::{DownloadOutcome, Headers, RetryPolicy},
};

/// Fetches one asset into a local file.
///
/// ## Normative
/// - On success the file at `dest` holds exactly the downloaded bytes and the returned
///   `content_hash` is their base64url SHA-256.
/// - If `expected_hash` is given and differs, the call fails and `dest` is left untouched.
/// - Failures are reported through the returned `Result`; implementations never panic.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download_file(
        &self,
        url: &Url,
        expected_hash: Option<&ContentHash>,
        dest: &Path,
        headers: &Headers,
    ) -> NetResult<DownloadOutcome>;
}

#[async_trait]
impl<D: Downloader + ?Sized> Downloader for Arc<D> {
    async fn download_file(
        &self,
        url: &Url,
        expected_hash: Option<&ContentHash>,
        dest: &Path,
        headers: &Headers,
    ) -> NetResult<DownloadOutcome> {
        (**self)
            .download_file(url, expected_hash, dest, headers)
            .await
    }
}

pub trait DownloaderExt: Downloader + Sized {
    /// Bound each download attempt by `timeout`.
    fn with_timeout(self, timeout: Duration) -> TimeoutDownloader<Self> {
        TimeoutDownloader::new(self, timeout)
    }

    /// Retry transient failures per `policy`.
    fn with_retry(self, policy: RetryPolicy) -> RetryDownloader<Self, DefaultRetryPolicy> {
        RetryDownloader::new(self, DefaultRetryPolicy::new(policy))
    }
}

impl<T: Downloader> DownloaderExt for T {}
