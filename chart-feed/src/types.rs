/// Core data types for the chart feed
///
/// These types match the JSON message format pushed by the market data
/// endpoint and returned by the historical backfill service.

use crate::error::FeedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLC price bar keyed by its bucket start time (unix seconds)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Candle {
    /// Bucket start, unique within a [`CandleStore`](crate::candles::CandleStore)
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }

    /// Candle opened and closed at a single price
    pub fn flat(time: i64, price: f64) -> Self {
        Self::new(time, price, price, price, price)
    }

    /// Bucket start as a UTC timestamp
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }

    /// Reject candles a chart cannot place on a price axis
    pub fn validate(&self) -> Result<(), FeedError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|price| !price.is_finite()) {
            return Err(FeedError::InvalidCandle {
                time: self.time,
                reason: "non-finite price",
            });
        }
        if self.high < self.low {
            return Err(FeedError::InvalidCandle {
                time: self.time,
                reason: "high below low",
            });
        }
        Ok(())
    }
}

/// Individual price update folded into the in-progress candle
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Tick {
    pub time: i64,
    pub price: f64,
}

/// Order side (Buy or Sell)
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "Buy", alias = "BUY")]
    Buy,
    #[serde(alias = "Sell", alias = "SELL")]
    Sell,
}

impl Side {
    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }

    /// Check if this is a buy
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Executed trade to be annotated on the chart
///
/// Immutable once received; kept for the lifetime of the chart session.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TradeMarker {
    pub time: i64,
    pub side: Side,
    pub price: f64,
}

/// Inbound stream message, tagged by its `type` field
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    /// Full or in-progress candle
    Market(Candle),
    /// Single price print
    Tick(Tick),
    /// Own fill or public trade
    #[serde(alias = "trade")]
    Fill(TradeMarker),
    /// Free-form server log line
    #[serde(alias = "log")]
    System { message: String },
    /// Greeting or keepalive without payload
    #[serde(alias = "heartbeat")]
    Welcome,
}

impl StreamMessage {
    /// Parse a raw text frame
    pub fn parse(text: &str) -> Result<Self, FeedError> {
        serde_json::from_str(text).map_err(FeedError::from)
    }

    /// Messages that carry no data for the pipeline
    pub fn is_control(&self) -> bool {
        matches!(self, StreamMessage::Welcome)
    }
}
