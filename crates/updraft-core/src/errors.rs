use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid update id: {0}")]
    InvalidUpdateId(String),
    #[error("invalid asset key {key:?}: {reason}")]
    InvalidAssetKey { key: String, reason: &'static str },
}

pub type CoreResult<T> = Result<T, CoreError>;
