use thiserror::Error;

/// Errors produced while downloading an asset.
#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },
    #[error("Timeout")]
    Timeout,
    #[error(
        "asset download was successful but base64url-encoded SHA-256 did not match expected; \
         URL: {url}; expected hash: {expected}; actual hash: {actual}"
    )]
    HashMismatch {
        url: String,
        expected: String,
        actual: String,
    },
    #[error("could not write downloaded file to {path}: {reason}")]
    Write { path: String, reason: String },
    #[error("Request failed after {max_retries} retries: {source}")]
    RetryExhausted {
        max_retries: u32,
        source: Box<NetError>,
    },
}

impl NetError {
    pub fn http<S: Into<String>>(msg: S) -> Self {
        Self::Http(msg.into())
    }

    pub fn http_status(status: u16, url: String) -> Self {
        Self::HttpStatus { status, url }
    }

    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Transient failures worth another attempt.
    ///
    /// Hash mismatches and local write failures are not: the same bytes would come back.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetError::Http(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("timeout") || msg.contains("connect") || msg.contains("network")
            }
            NetError::Timeout => true,
            NetError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            NetError::HashMismatch { .. }
            | NetError::Write { .. }
            | NetError::RetryExhausted { .. } => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NetError::Timeout)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            NetError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::Timeout;
        }
        Self::Http(error.to_string())
    }
}

pub type NetResult<T> = Result<T, NetError>;
