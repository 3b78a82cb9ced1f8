//! Scripted in-memory [`Downloader`].

use std::{
    collections::HashMap,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use updraft_core::ContentHash;
use updraft_net::{DownloadOutcome, Downloader, Headers, NetError, NetResult};
use updraft_platform::write_atomic;
use url::Url;

enum Reply {
    Body(Vec<u8>),
    Fail(NetError),
}

/// Serves registered bodies by URL; anything else is a 404.
///
/// Behaves like the real downloader: the body is hashed, checked against the expected hash
/// and written atomically, so reconciliation sees the same outcomes it would in production.
#[derive(Default)]
pub struct FakeDownloader {
    replies: Mutex<HashMap<Url, Reply>>,
    calls: Mutex<Vec<Url>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeDownloader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each download for `delay` before completing.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn serve<B: Into<Vec<u8>>>(&self, url: Url, body: B) {
        self.replies.lock().insert(url, Reply::Body(body.into()));
    }

    pub fn fail(&self, url: Url, error: NetError) {
        self.replies.lock().insert(url, Reply::Fail(error));
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Url> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of downloads observed running at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &Url) -> Result<Vec<u8>, NetError> {
        match self.replies.lock().get(url) {
            Some(Reply::Body(body)) => Ok(body.clone()),
            Some(Reply::Fail(error)) => Err(error.clone()),
            None => Err(NetError::http_status(404, url.to_string())),
        }
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download_file(
        &self,
        url: &Url,
        expected_hash: Option<&ContentHash>,
        dest: &Path,
        _headers: &Headers,
    ) -> NetResult<DownloadOutcome> {
        self.calls.lock().push(url.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.complete(url, expected_hash, dest);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl FakeDownloader {
    fn complete(
        &self,
        url: &Url,
        expected_hash: Option<&ContentHash>,
        dest: &Path,
    ) -> NetResult<DownloadOutcome> {
        let body = self.lookup(url)?;
        let content_hash = ContentHash::of_bytes(&body);
        if let Some(expected) = expected_hash
            && expected != &content_hash
        {
            return Err(NetError::HashMismatch {
                url: url.to_string(),
                expected: expected.to_string(),
                actual: content_hash.to_string(),
            });
        }
        write_atomic(dest, &body).map_err(|e| NetError::Write {
            path: dest.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut response_headers = Headers::new();
        response_headers.insert("content-type", "application/javascript");
        Ok(DownloadOutcome {
            response_headers,
            content_hash,
            len: body.len() as u64,
        })
    }
}
