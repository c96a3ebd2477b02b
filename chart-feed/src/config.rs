/// Connector and pipeline configuration
///
/// Every retry, timeout and retention knob lives here and is passed in at
/// construction; nothing reads module level constants at runtime.
use crate::candles::{DEFAULT_INTERVAL_SECS, DEFAULT_RETENTION};
use crate::markers::MarkerTolerance;
use std::time::Duration;

/// Stream connector configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorConfig {
    /// WebSocket server URL
    pub url: String,
    /// Delay between a drop and the next connection attempt
    pub reconnect_delay: Duration,
    /// Ping interval to keep connection alive
    pub ping_interval: Duration,
    /// Silence after which an open connection is treated as dead
    pub read_timeout: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9001".to_string(),
            reconnect_delay: Duration::from_secs(3),
            ping_interval: Duration::from_secs(30),
            read_timeout: Duration::from_secs(120),
        }
    }
}

impl ConnectorConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Chart pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub connector: ConnectorConfig,
    /// Maximum candles kept in the store
    pub retention: usize,
    /// Candle bucket width used for tick aggregation
    pub interval_secs: i64,
    pub marker_tolerance: MarkerTolerance,
    /// Historical candle endpoint, backfill is skipped when unset
    pub backfill_url: Option<String>,
    pub symbol: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            connector: ConnectorConfig::default(),
            retention: DEFAULT_RETENTION,
            interval_secs: DEFAULT_INTERVAL_SECS,
            marker_tolerance: MarkerTolerance::default(),
            backfill_url: None,
            symbol: "BTCUSDT".to_string(),
        }
    }
}

impl FeedConfig {
    pub fn with_connector(mut self, connector: ConnectorConfig) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_interval_secs(mut self, interval_secs: i64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    pub fn with_marker_tolerance(mut self, tolerance: MarkerTolerance) -> Self {
        self.marker_tolerance = tolerance;
        self
    }

    /// Build from `CHART_*` environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let connector = ConnectorConfig {
            url: lookup("CHART_WS_URL").unwrap_or(defaults.connector.url),
            reconnect_delay: parsed("CHART_RECONNECT_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.connector.reconnect_delay),
            ping_interval: defaults.connector.ping_interval,
            read_timeout: parsed("CHART_READ_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.connector.read_timeout),
        };

        Self {
            connector,
            retention: parsed("CHART_RETENTION")
                .map(|v| v as usize)
                .unwrap_or(defaults.retention),
            interval_secs: parsed("CHART_INTERVAL_SECS")
                .filter(|&v| v > 0)
                .map(|v| v as i64)
                .unwrap_or(defaults.interval_secs),
            marker_tolerance: parsed("CHART_MARKER_TOLERANCE_SECS")
                .map(MarkerTolerance::Seconds)
                .unwrap_or(defaults.marker_tolerance),
            backfill_url: lookup("CHART_BACKFILL_URL").filter(|v| !v.is_empty()),
            symbol: lookup("CHART_SYMBOL")
                .map(|s| s.trim().to_uppercase())
                .unwrap_or(defaults.symbol),
        }
    }
}
