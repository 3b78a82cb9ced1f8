#![forbid(unsafe_code)]

use thiserror::Error;
use updraft_core::{CoreError, UpdateId};

/// Record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("update {0} not found")]
    UpdateNotFound(UpdateId),

    #[error("update {0} already exists")]
    UpdateExists(UpdateId),

    #[error("asset with key {0:?} not found")]
    AssetNotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
