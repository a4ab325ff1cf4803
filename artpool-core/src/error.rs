use thiserror::Error;

use crate::{catalog::CatalogError, providers::ProviderError};

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Truncated body from {url}: got {got} of {expected} bytes")]
    TruncatedBody {
        url: String,
        got: u64,
        expected: u64,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PoolError {
    /// Failures worth retrying: timeouts, dropped connections, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            PoolError::Http(e) => is_transient_transport(e),
            PoolError::HttpStatus { status, .. } => {
                *status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    || status.is_server_error()
            }
            PoolError::Provider(ProviderError::RateLimited) => true,
            PoolError::Provider(ProviderError::NetworkError(e)) => is_transient_transport(e),
            PoolError::TruncatedBody { .. } => true,
            PoolError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Timeouts, refused or reset connections and bodies cut off mid-stream.
/// Builder, redirect and decode errors will not improve on a second try.
fn is_transient_transport(e: &reqwest::Error) -> bool {
    if e.is_builder() || e.is_decode() || e.is_redirect() {
        return false;
    }
    e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
}

pub type Result<T> = std::result::Result<T, PoolError>;
