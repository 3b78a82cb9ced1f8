//! Pool for blocking filesystem work.
//!
//! Wraps [`rayon::ThreadPool`]. Async callers hand a closure to [`IoPool::run`] and await the
//! result; the closure runs on a pool thread and its result is marshaled back through a
//! oneshot channel, so the awaiting task never blocks on I/O itself.
//!
//! Cloning is cheap (Arc increment). One pool is normally shared by every launcher and reaper
//! of a process; [`IoPool::shared`] (the default) is that pool.

use std::{
    fmt, io,
    sync::{Arc, OnceLock},
    thread,
};

use futures::channel::oneshot;

#[derive(Clone)]
pub struct IoPool {
    inner: Option<Arc<rayon::ThreadPool>>,
}

// Process-wide dedicated pool; `None` if it could not be built.
static SHARED_POOL: OnceLock<Option<IoPool>> = OnceLock::new();

impl IoPool {
    /// Use the global rayon pool.
    ///
    /// A panicking task aborts the process on the global pool; prefer a dedicated pool.
    #[must_use]
    pub fn global() -> Self {
        Self { inner: None }
    }

    /// Dedicated pool with `n` threads named `updraft-io-<i>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rayon pool cannot be created.
    pub fn with_num_threads(n: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        Self::build(n, "updraft-io")
    }

    /// Process-wide dedicated pool, sized to the available parallelism and built on first use.
    ///
    /// Threads are named `updraft-shared-io-<i>` and survive panicking tasks. Falls back to
    /// [`IoPool::global`] if the pool cannot be built.
    #[must_use]
    pub fn shared() -> Self {
        SHARED_POOL
            .get_or_init(|| {
                let n = thread::available_parallelism().map_or(2, |n| n.get().max(2));
                Self::build(n, "updraft-shared-io").ok()
            })
            .clone()
            .unwrap_or_else(Self::global)
    }

    fn build(n: usize, prefix: &'static str) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(move |i| format!("{prefix}-{i}"))
            // The panicking task's oneshot sender is dropped; the awaiting caller sees an error.
            .panic_handler(|_| {})
            .build()?;
        Ok(Self {
            inner: Some(Arc::new(pool)),
        })
    }

    /// Fire-and-forget.
    pub fn spawn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.inner {
            Some(ref pool) => pool.spawn(f),
            None => rayon::spawn(f),
        }
    }

    /// Run `f` on the pool and await its result.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool thread panicked before producing a result.
    pub async fn spawn_async<F, R>(&self, f: F) -> io::Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.spawn(move || {
            let _ = tx.send(f());
        });
        rx.await
            .map_err(|_| io::Error::other("io pool task panicked"))
    }

    /// Run a fallible filesystem operation on the pool.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error, or an error if the pool thread panicked.
    pub async fn run<F, R>(&self, f: F) -> io::Result<R>
    where
        F: FnOnce() -> io::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.spawn_async(f).await?
    }
}

impl Default for IoPool {
    fn default() -> Self {
        Self::shared()
    }
}

impl fmt::Debug for IoPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            Some(ref pool) => f
                .debug_struct("IoPool")
                .field("kind", &"dedicated")
                .field("num_threads", &pool.current_num_threads())
                .finish(),
            None => f.debug_struct("IoPool").field("kind", &"global").finish(),
        }
    }
}
