use tagscout_core::{OptionsError, RateLimitSignal};
use thiserror::Error;

/// Every way a discovery call can fail.
///
/// Which of these stop a crawl is decided by the caller of each layer: post
/// processing swallows everything, the scheduler swallows per-server failures,
/// and follow operations surface `RateLimited` unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("network error: {message}")]
    Network {
        status: Option<u16>,
        message: String,
    },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rate limited (retry after {:?}s)", .0.retry_after_seconds)]
    RateLimited(RateLimitSignal),
    #[error("permission denied (status {status})")]
    Permission { status: u16 },
    #[error("could not resolve {acct}: {message}")]
    Resolution { acct: String, message: String },
    #[error("server directory unavailable: {0}")]
    Directory(String),
    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("response too large (max {max_bytes} bytes)")]
    TooLarge { max_bytes: u64 },
    #[error("caller identity is not known")]
    MissingIdentity,
    #[error(transparent)]
    InvalidOptions(#[from] OptionsError),
}

impl DiscoveryError {
    pub(crate) fn network(message: impl Into<String>) -> Self {
        DiscoveryError::Network {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DiscoveryError::RateLimited(_))
    }

    pub fn rate_limit(&self) -> Option<&RateLimitSignal> {
        match self {
            DiscoveryError::RateLimited(signal) => Some(signal),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return DiscoveryError::Timeout(err.to_string());
        }
        DiscoveryError::Network {
            status: err.status().map(|status| status.as_u16()),
            message: err.to_string(),
        }
    }
}
