//! Real-time market data pipeline for charting dashboards
//!
//! A reconnecting websocket [`StreamConnector`] feeds a [`ChartFeed`], which
//! keeps an ordered, bounded [`CandleStore`], derives indicator overlays on
//! demand and binds trade markers to the candles they belong to.
//!
//! ```no_run
//! use chart_feed::{ChartFeed, FeedConfig, IndicatorSpec, StreamConnector};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), chart_feed::FeedError> {
//! let config = FeedConfig::from_env();
//! let feed = Arc::new(Mutex::new(ChartFeed::new(&config)));
//! feed.lock().registry_mut().add(IndicatorSpec::sma("sma-20", 20))?;
//!
//! let connector = StreamConnector::new(config.connector.clone())?;
//! let sink = Arc::clone(&feed);
//! let handle = connector.connect(move |msg| sink.lock().apply(msg), |_| {});
//!
//! let overlays = feed.lock().overlays();
//! handle.close();
//! # Ok(())
//! # }
//! ```

pub mod backfill;
pub mod candles;
pub mod config;
pub mod error;
pub mod feed;
pub mod indicators;
pub mod markers;
pub mod overlays;
pub mod stream;
pub mod types;

pub use backfill::{BackfillClient, BackfillRequest};
pub use candles::{CandleStore, Merge};
pub use config::{ConnectorConfig, FeedConfig};
pub use error::FeedError;
pub use feed::{ChartFeed, Overlay};
pub use indicators::{BandPoint, IndicatorKind, IndicatorSeries, LinePoint};
pub use markers::{AlignedMarker, MarkerAnnotation, MarkerPosition, MarkerTolerance};
pub use overlays::{IndicatorSpec, OverlayRegistry};
pub use stream::{ConnectionHandle, StreamConnector, StreamPhase, StreamState};
pub use types::{Candle, Side, StreamMessage, Tick, TradeMarker};
