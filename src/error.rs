use thiserror::Error;

/// Failure of one coin list fetch. Never fatal: the next poll tick retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid coin list payload: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { url: url.to_string() }
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Chart surface construction failure for a single grid slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("container for {coin_id} has no drawable area ({width}x{height})")]
    EmptyContainer {
        coin_id: String,
        width: u16,
        height: u16,
    },

    #[error("renderer rejected chart for {coin_id}: {reason}")]
    Backend { coin_id: String, reason: String },
}

impl SurfaceError {
    pub fn coin_id(&self) -> &str {
        match self {
            Self::EmptyContainer { coin_id, .. } | Self::Backend { coin_id, .. } => coin_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    #[error("Please enter a valid amount.")]
    InvalidAmount,

    #[error("Select a coin before trading.")]
    NoSelection,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("preferences I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("preferences file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
