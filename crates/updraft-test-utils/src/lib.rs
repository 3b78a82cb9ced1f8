#![forbid(unsafe_code)]

//! Shared test utilities for the updraft workspace: update/asset fixtures, a scripted
//! [`FakeDownloader`] and a local [`AssetServer`].

pub mod fake_downloader;
pub mod fixtures;
pub mod http_server;

pub use fake_downloader::FakeDownloader;
pub use fixtures::*;
pub use http_server::{AssetServer, RecordedRequest};

/// Install a `fmt` subscriber honouring `RUST_LOG` (default `info`). Safe to call from every
/// test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
