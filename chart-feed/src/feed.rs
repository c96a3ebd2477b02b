//! Chart pipeline state.
//!
//! [`ChartFeed`] routes stream messages into the candle store and the trade
//! marker queue, and derives overlay series and trade annotations on demand.
//! It is single-owner: share it between the connector callback and a render
//! loop behind a mutex.

use crate::candles::CandleStore;
use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::indicators::{IndicatorKind, IndicatorSeries};
use crate::markers::{self, AlignedMarker, MarkerAnnotation, MarkerTolerance};
use crate::overlays::{IndicatorSpec, OverlayRegistry};
use crate::types::{Candle, StreamMessage, TradeMarker};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Visible overlay with its derived series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub spec: IndicatorSpec,
    pub series: IndicatorSeries,
}

/// Series computed for one overlay, valid while its inputs are unchanged
#[derive(Debug, Clone)]
struct CachedSeries {
    revision: u64,
    kind: IndicatorKind,
    period: usize,
    std_dev_multiplier: f64,
    series: IndicatorSeries,
}

impl CachedSeries {
    fn is_fresh(&self, spec: &IndicatorSpec, revision: u64) -> bool {
        self.revision == revision
            && self.kind == spec.kind
            && self.period == spec.period
            && self.std_dev_multiplier == spec.std_dev_multiplier
    }
}

#[derive(Debug)]
pub struct ChartFeed {
    store: CandleStore,
    registry: OverlayRegistry,
    trades: Vec<TradeMarker>,
    marker_tolerance: MarkerTolerance,
    cache: HashMap<String, CachedSeries>,
}

impl ChartFeed {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            store: CandleStore::new(config.retention, config.interval_secs),
            registry: OverlayRegistry::new(),
            trades: Vec::new(),
            marker_tolerance: config.marker_tolerance,
            cache: HashMap::new(),
        }
    }

    /// Route one stream message into the pipeline
    pub fn apply(&mut self, message: StreamMessage) {
        match message {
            StreamMessage::Market(candle) => {
                if let Err(error) = self.store.ingest(candle) {
                    warn!(%error, "Dropping invalid candle");
                }
            }
            StreamMessage::Tick(tick) => {
                if let Err(error) = self.store.ingest_tick(tick) {
                    warn!(%error, "Dropping invalid tick");
                }
            }
            StreamMessage::Fill(trade) => {
                debug!(time = trade.time, side = %trade.side, price = trade.price, "Trade marker queued");
                self.trades.push(trade);
            }
            StreamMessage::System { message } => {
                info!(target: "chart_feed::remote", "{message}");
            }
            StreamMessage::Welcome => {}
        }
        self.prune_trades();
    }

    /// Drop trades that can no longer bind to a candle
    ///
    /// Only applies once the store is at retention: from then on an older
    /// candle is evicted on arrival, so a trade further than the tolerance
    /// before the first candle stays unaligned for good.
    fn prune_trades(&mut self) {
        if self.store.len() < self.store.retention() {
            return;
        }
        let Some(first) = self.store.candles().first() else {
            self.trades.clear();
            return;
        };

        let tolerance = self.marker_tolerance.resolve(self.store.interval_secs());
        let cutoff = first
            .time
            .saturating_sub(i64::try_from(tolerance).unwrap_or(i64::MAX));
        let before = self.trades.len();
        self.trades.retain(|trade| trade.time >= cutoff);

        let pruned = before - self.trades.len();
        if pruned > 0 {
            debug!(pruned, cutoff, "Pruned trades behind the candle window");
        }
    }

    /// Parse and apply a raw text payload; malformed payloads are logged and dropped
    pub fn apply_raw(&mut self, text: &str) -> Result<(), FeedError> {
        let message = StreamMessage::parse(text).inspect_err(|error| {
            warn!(%error, "Dropping malformed payload");
        })?;
        self.apply(message);
        Ok(())
    }

    /// Replace the candle history and forget the session's trades
    ///
    /// Returns the number of candles rejected as invalid.
    pub fn load_history(&mut self, candles: Vec<Candle>) -> usize {
        let received = candles.len();
        let rejected = self.store.reset(candles);
        self.trades.clear();
        info!(
            received,
            rejected,
            kept = self.store.len(),
            "Loaded candle history"
        );
        rejected
    }

    /// Visible overlays in registry order, recomputing only stale series
    pub fn overlays(&mut self) -> Vec<Overlay> {
        let revision = self.store.revision();
        let registry = &self.registry;
        self.cache.retain(|id, _| registry.get(id).is_some());

        let visible = self.registry.list_visible();
        let mut overlays = Vec::with_capacity(visible.len());
        for spec in visible {
            let series = match self.cache.get(&spec.id) {
                Some(cached) if cached.is_fresh(&spec, revision) => cached.series.clone(),
                _ => {
                    let series = spec.compute(self.store.candles());
                    self.cache.insert(
                        spec.id.clone(),
                        CachedSeries {
                            revision,
                            kind: spec.kind,
                            period: spec.period,
                            std_dev_multiplier: spec.std_dev_multiplier,
                            series: series.clone(),
                        },
                    );
                    series
                }
            };
            overlays.push(Overlay { spec, series });
        }
        overlays
    }

    /// Trades bound to their nearest candle within the configured tolerance
    pub fn aligned_markers(&self) -> Vec<AlignedMarker> {
        let tolerance = self.marker_tolerance.resolve(self.store.interval_secs());
        markers::align(&self.trades, self.store.candles(), tolerance)
    }

    pub fn annotations(&self) -> Vec<MarkerAnnotation> {
        markers::annotate(&self.aligned_markers())
    }

    pub fn set_marker_tolerance(&mut self, tolerance: MarkerTolerance) {
        self.marker_tolerance = tolerance;
    }

    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut OverlayRegistry {
        &mut self.registry
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CandleStore {
        &mut self.store
    }

    pub fn trades(&self) -> &[TradeMarker] {
        &self.trades
    }
}

impl Default for ChartFeed {
    fn default() -> Self {
        Self::new(&FeedConfig::default())
    }
}
