use thiserror::Error;

/// All errors generated in `chart-feed`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("invalid stream endpoint url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("malformed stream payload: {0}")]
    Malformed(String),

    #[error("invalid candle at time {time}: {reason}")]
    InvalidCandle { time: i64, reason: &'static str },

    #[error("overlay id already registered: {0}")]
    DuplicateOverlay(String),

    #[error("no overlay registered with id: {0}")]
    UnknownOverlay(String),

    #[error("historical backfill failed: {0}")]
    Backfill(String),
}

impl FeedError {
    /// Determine if an error ends the current connection and sends the
    /// [`StreamConnector`](crate::stream::StreamConnector) down the reconnect path.
    /// Any other error on an open connection only drops the offending frame.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transport(&self) -> bool {
        match self {
            FeedError::Connect { .. } | FeedError::Socket(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(value: reqwest::Error) -> Self {
        Self::Backfill(value.to_string())
    }
}
