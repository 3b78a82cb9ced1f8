#![forbid(unsafe_code)]

//! # updraft-net
//!
//! Fetches update assets into local files. Bodies are hashed (base64url SHA-256) while they
//! stream and only land on disk, atomically, after verification.
//!
//! [`HttpDownloader`] is the production implementation; [`DownloaderExt`] layers
//! [`TimeoutDownloader`] and [`RetryDownloader`] on top of any [`Downloader`].

mod client;
mod error;
mod retry;
mod timeout;
mod traits;
mod types;

pub use client::HttpDownloader;
pub use error::{NetError, NetResult};
pub use retry::{DefaultRetryPolicy, RetryDownloader, RetryPolicyTrait};
pub use timeout::TimeoutDownloader;
pub use traits::{Downloader, DownloaderExt};
pub use types::{DownloadOutcome, Headers, NetOptions, RetryPolicy};
