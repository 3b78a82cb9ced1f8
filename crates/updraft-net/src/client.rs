use std::path::Path;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, trace};
use updraft_core::ContentHash;
use updraft_platform::{IoPool, write_atomic};
use url::Url;

use crate::{
    error::{NetError, NetResult},
    retry::{DefaultRetryPolicy, RetryDownloader},
    traits::{Downloader, DownloaderExt},
    types::{DownloadOutcome, Headers, NetOptions},
};

/// [`Downloader`] over HTTP(S) backed by `reqwest`.
///
/// The body is hashed while it streams in and written to `dest` only once the hash has been
/// verified. The write runs on the downloader's [`IoPool`].
#[derive(Clone, Debug)]
pub struct HttpDownloader {
    inner: Client,
    options: NetOptions,
    pool: IoPool,
}

impl HttpDownloader {
    /// # Errors
    ///
    /// Returns [`NetError::Http`] if the underlying client cannot be built (e.g. TLS backend
    /// initialization failure).
    pub fn new(options: NetOptions) -> NetResult<Self> {
        let inner = Client::builder()
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build()?;
        Ok(Self {
            inner,
            options,
            pool: IoPool::default(),
        })
    }

    #[must_use]
    pub fn with_pool(mut self, pool: IoPool) -> Self {
        self.pool = pool;
        self
    }

    /// Client wrapped in the retry layer described by `options.retry_policy`.
    ///
    /// # Errors
    ///
    /// Same as [`HttpDownloader::new`].
    pub fn retrying(options: NetOptions) -> NetResult<RetryDownloader<Self, DefaultRetryPolicy>> {
        let policy = options.retry_policy.clone();
        Ok(Self::new(options)?.with_retry(policy))
    }

    pub fn options(&self) -> &NetOptions {
        &self.options
    }

    fn apply_headers(
        mut req: reqwest::RequestBuilder,
        headers: &Headers,
    ) -> reqwest::RequestBuilder {
        for (k, v) in headers.iter() {
            req = req.header(k, v);
        }
        req
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download_file(
        &self,
        url: &Url,
        expected_hash: Option<&ContentHash>,
        dest: &Path,
        headers: &Headers,
    ) -> NetResult<DownloadOutcome> {
        debug!(%url, dest = ?dest, "downloading asset");

        let req = Self::apply_headers(self.inner.get(url.clone()), headers);
        // The timeout covers the request/response phase only; bodies may take arbitrarily long.
        let send = req.send();
        let resp = match self.options.request_timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| NetError::timeout())??,
            None => send.await?,
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(NetError::http_status(status.as_u16(), url.to_string()));
        }

        let mut response_headers = Headers::new();
        for (name, value) in resp.headers() {
            if let Ok(v) = value.to_str() {
                response_headers.insert(name.as_str(), v);
            }
        }

        let mut hasher = ContentHash::hasher();
        let mut body = BytesMut::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            body.extend_from_slice(&chunk);
            trace!(%url, received = body.len(), "asset chunk");
        }

        let content_hash = hasher.finish();
        if let Some(expected) = expected_hash
            && expected != &content_hash
        {
            return Err(NetError::HashMismatch {
                url: url.to_string(),
                expected: expected.to_string(),
                actual: content_hash.to_string(),
            });
        }

        let len = body.len() as u64;
        let target = dest.to_path_buf();
        let body = body.freeze();
        self.pool
            .run(move || write_atomic(&target, &body))
            .await
            .map_err(|e| NetError::Write {
                path: dest.display().to_string(),
                reason: e.to_string(),
            })?;

        debug!(%url, len, hash = %content_hash, "asset downloaded");
        Ok(DownloadOutcome {
            response_headers,
            content_hash,
            len,
        })
    }
}
