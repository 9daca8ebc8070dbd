use std::time::Duration;
use thiserror::Error;

/// Errors raised while fetching a game from the upstream feed.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("feed returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("feed did not answer within {0:?}")]
    Timeout(Duration),

    /// The feed answered but the payload is not a usable game.
    #[error("invalid feed payload: {0}")]
    InvalidPayload(String),

    #[error("invalid feed url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl UpstreamError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Request(_) | UpstreamError::Timeout(_) => true,
            UpstreamError::Status { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            UpstreamError::InvalidPayload(_) | UpstreamError::InvalidUrl { .. } => false,
        }
    }
}
