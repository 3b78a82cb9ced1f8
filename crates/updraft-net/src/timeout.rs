use std::{path::Path, time::Duration};

use async_trait::async_trait;
use updraft_core::ContentHash;
use url::Url;

use crate::{
    error::{NetError, NetResult},
    traits::Downloader,
    types::{DownloadOutcome, Headers},
};

/// Timeout decorator for [`Downloader`] implementations. Bounds the whole download, body
/// included.
pub struct TimeoutDownloader<D> {
    inner: D,
    timeout: Duration,
}

impl<D: Downloader> TimeoutDownloader<D> {
    pub fn new(inner: D, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<D: Downloader> Downloader for TimeoutDownloader<D> {
    async fn download_file(
        &self,
        url: &Url,
        expected_hash: Option<&ContentHash>,
        dest: &Path,
        headers: &Headers,
    ) -> NetResult<DownloadOutcome> {
        tokio::time::timeout(
            self.timeout,
            self.inner.download_file(url, expected_hash, dest, headers),
        )
        .await
        .map_err(|_| NetError::timeout())?
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    struct Stalled;

    #[async_trait]
    impl Downloader for Stalled {
        async fn download_file(
            &self,
            _url: &Url,
            _expected_hash: Option<&ContentHash>,
            _dest: &Path,
            _headers: &Headers,
        ) -> NetResult<DownloadOutcome> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_download_times_out() {
        let dl = TimeoutDownloader::new(Stalled, Duration::from_millis(20));
        let url = Url::parse("http://test.invalid/a.js").unwrap();
        let err = dl
            .download_file(&url, None, &PathBuf::from("/unused"), &Headers::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
