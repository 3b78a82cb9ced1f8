#![forbid(unsafe_code)]

use std::io;

use thiserror::Error;
use updraft_core::{CoreError, UpdateId};
use updraft_net::NetError;
use updraft_store::StoreError;

/// Why one asset could not be made available on disk.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error(transparent)]
    InvalidKey(#[from] CoreError),

    #[error("failed to copy embedded resource {filename}: {source}")]
    Copy { filename: String, source: io::Error },

    #[error("embedded resource {0} is not available")]
    MissingResource(String),

    #[error("download failed: {0}")]
    Download(#[from] NetError),

    #[error("no URL provided for asset")]
    NoUrl,

    #[error("asset worker stopped before reporting")]
    Interrupted,
}

pub type AssetResult<T> = Result<T, AssetError>;

/// Terminal failures of a launch attempt.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Store unreadable (`source` is set), or readable but nothing launchable passed selection.
    #[error("no launchable updates found")]
    NoLaunchableUpdate {
        #[source]
        source: Option<StoreError>,
    },

    #[error("failed to load launch asset {key:?}: {source}")]
    LaunchAsset {
        key: String,
        #[source]
        source: AssetError,
    },

    #[error("update {0} has no launch asset")]
    MissingLaunchAsset(UpdateId),

    #[error("launcher already used; each launcher launches once")]
    AlreadyLaunched,

    #[error("no embedded update in this binary")]
    NoEmbeddedUpdate,

    #[error("embedded manifest is invalid: {0}")]
    EmbeddedManifest(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl LaunchError {
    pub(crate) fn no_launchable(source: Option<StoreError>) -> Self {
        Self::NoLaunchableUpdate { source }
    }
}

pub type LaunchResult<T> = Result<T, LaunchError>;
