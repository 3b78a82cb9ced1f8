use std::{path::Path, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;
use updraft_core::ContentHash;
use url::Url;

use crate::{
    error::{NetError, NetResult},
    traits::Downloader,
    types::{DownloadOutcome, Headers, RetryPolicy},
};

pub trait RetryPolicyTrait: Send + Sync {
    fn should_retry(&self, error: &NetError, attempt: u32) -> bool;
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
    fn max_attempts(&self) -> u32;
}

/// Retries errors that [`NetError::is_retryable`] accepts, up to `max_retries` extra attempts.
#[derive(Clone, Debug)]
pub struct DefaultRetryPolicy {
    policy: RetryPolicy,
}

impl DefaultRetryPolicy {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl RetryPolicyTrait for DefaultRetryPolicy {
    fn should_retry(&self, error: &NetError, attempt: u32) -> bool {
        attempt < self.policy.max_retries && error.is_retryable()
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.policy.delay_for_attempt(attempt)
    }

    fn max_attempts(&self) -> u32 {
        self.policy.max_retries
    }
}

/// Retry decorator for [`Downloader`] implementations.
///
/// Attempts write through the inner downloader; a failed attempt leaves no partial file.
pub struct RetryDownloader<D, P> {
    inner: D,
    retry_policy: P,
}

impl<D: Downloader, P: RetryPolicyTrait> RetryDownloader<D, P> {
    pub fn new(inner: D, retry_policy: P) -> Self {
        Self {
            inner,
            retry_policy,
        }
    }
}

#[async_trait]
impl<D: Downloader, P: RetryPolicyTrait> Downloader for RetryDownloader<D, P> {
    async fn download_file(
        &self,
        url: &Url,
        expected_hash: Option<&ContentHash>,
        dest: &Path,
        headers: &Headers,
    ) -> NetResult<DownloadOutcome> {
        let max = self.retry_policy.max_attempts();
        let mut attempt = 0;
        loop {
            match self
                .inner
                .download_file(url, expected_hash, dest, headers)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(error) => {
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    if !self.retry_policy.should_retry(&error, attempt) {
                        return Err(NetError::RetryExhausted {
                            max_retries: max,
                            source: Box::new(error),
                        });
                    }
                    attempt += 1;
                    let delay = self.retry_policy.delay_for_attempt(attempt);
                    warn!(%url, attempt, ?delay, %error, "retrying asset download");
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        path::PathBuf,
        sync::{
            Mutex,
            atomic::{AtomicU32, Ordering},
        },
    };

    use rstest::rstest;

    use super::*;

    struct Scripted {
        replies: Mutex<VecDeque<NetResult<DownloadOutcome>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(replies: Vec<NetResult<DownloadOutcome>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Downloader for Scripted {
        async fn download_file(
            &self,
            _url: &Url,
            _expected_hash: Option<&ContentHash>,
            _dest: &Path,
            _headers: &Headers,
        ) -> NetResult<DownloadOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(NetError::Timeout))
        }
    }

    fn ok() -> NetResult<DownloadOutcome> {
        Ok(DownloadOutcome {
            response_headers: Headers::new(),
            content_hash: ContentHash::of_bytes(b"x"),
            len: 1,
        })
    }

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(5))
    }

    async fn run(
        replies: Vec<NetResult<DownloadOutcome>>,
        max_retries: u32,
    ) -> (NetResult<DownloadOutcome>, u32) {
        let inner = Scripted::new(replies);
        let dl = RetryDownloader::new(inner, DefaultRetryPolicy::new(fast(max_retries)));
        let url = Url::parse("http://test.invalid/a.js").unwrap();
        let res = dl
            .download_file(&url, None, &PathBuf::from("/unused"), &Headers::new())
            .await;
        (res, dl.inner.calls.load(Ordering::SeqCst))
    }

    #[rstest]
    #[case(0, true)]
    #[case(2, true)]
    #[case(3, false)]
    fn default_policy_caps_attempts(#[case] attempt: u32, #[case] expected: bool) {
        let p = DefaultRetryPolicy::new(RetryPolicy::default());
        assert_eq!(p.should_retry(&NetError::Timeout, attempt), expected);
    }

    #[rstest]
    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let (res, calls) = run(vec![Err(NetError::Timeout), Err(NetError::Timeout), ok()], 3).await;
        assert!(res.is_ok());
        assert_eq!(calls, 3);
    }

    #[rstest]
    #[tokio::test]
    async fn exhausted_retries_wrap_last_error() {
        let (res, calls) = run(vec![], 2).await;
        assert_eq!(calls, 3);
        match res {
            Err(NetError::RetryExhausted {
                max_retries,
                source,
            }) => {
                assert_eq!(max_retries, 2);
                assert!(source.is_timeout());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[rstest]
    #[case(NetError::http_status(404, "u".into()))]
    #[case(NetError::HashMismatch { url: "u".into(), expected: "a".into(), actual: "b".into() })]
    #[tokio::test]
    async fn permanent_errors_fail_immediately(#[case] error: NetError) {
        let (res, calls) = run(vec![Err(error.clone())], 3).await;
        assert_eq!(calls, 1);
        assert_eq!(res.unwrap_err().to_string(), error.to_string());
    }
}
