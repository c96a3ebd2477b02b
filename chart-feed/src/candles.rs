//! Ordered candle storage
//!
//! Keeps candles ascending and unique by `time`. Live updates usually touch the
//! last candle, late deliveries are placed by binary search, and ticks are
//! bucketed by the configured interval.

use crate::error::FeedError;
use crate::types::{Candle, Tick};
use tracing::debug;

/// Default number of candles kept before the oldest are evicted
pub const DEFAULT_RETENTION: usize = 500;

/// Default bucket width for tick aggregation (1 minute)
pub const DEFAULT_INTERVAL_SECS: i64 = 60;

/// How an update landed in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// Same `time` as an existing candle, last write wins
    Replaced,
    /// Newer than every stored candle
    Appended,
    /// Late delivery placed between existing candles
    Inserted,
}

/// Time-ordered candle sequence with FIFO retention
#[derive(Debug, Clone)]
pub struct CandleStore {
    candles: Vec<Candle>,
    retention: usize,
    interval_secs: i64,
    revision: u64,
}

impl CandleStore {
    pub fn new(retention: usize, interval_secs: i64) -> Self {
        Self {
            candles: Vec::with_capacity(retention.min(4096)),
            retention,
            interval_secs: interval_secs.max(1),
            revision: 0,
        }
    }

    /// Merge a candle by `time`
    pub fn ingest(&mut self, candle: Candle) -> Result<Merge, FeedError> {
        candle.validate()?;
        let merge = self.place(candle);
        self.evict();
        self.revision += 1;
        Ok(merge)
    }

    /// Fold a tick into the candle of its bucket, opening one if needed
    pub fn ingest_tick(&mut self, tick: Tick) -> Result<Merge, FeedError> {
        if !tick.price.is_finite() {
            return Err(FeedError::InvalidCandle {
                time: tick.time,
                reason: "non-finite price",
            });
        }

        let bucket = self
            .bucket_start(tick.time)
            .ok_or(FeedError::InvalidCandle {
                time: tick.time,
                reason: "time outside bucketable range",
            })?;
        let candle = match self.position(bucket) {
            Ok(index) => {
                let current = self.candles[index];
                Candle {
                    time: bucket,
                    open: current.open,
                    high: current.high.max(tick.price),
                    low: current.low.min(tick.price),
                    close: tick.price,
                }
            }
            Err(_) => Candle::flat(bucket, tick.price),
        };

        self.ingest(candle)
    }

    /// Owned copy for consumers, ascending with unique times
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.clone()
    }

    /// Borrowed view of the stored candles
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Change the retention window, evicting immediately if it shrank
    pub fn set_retention(&mut self, max_count: usize) {
        self.retention = max_count;
        if self.evict() > 0 {
            self.revision += 1;
        }
    }

    /// Replace the whole sequence, e.g. after a symbol change
    pub fn reset(&mut self, candles: impl IntoIterator<Item = Candle>) -> usize {
        self.candles.clear();
        let mut rejected = 0;
        for candle in candles {
            if candle.validate().is_err() {
                rejected += 1;
                continue;
            }
            self.place(candle);
        }
        self.evict();
        self.revision += 1;
        rejected
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn interval_secs(&self) -> i64 {
        self.interval_secs
    }

    /// Bumped on every mutation; derived data keyed on it goes stale when it moves
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Align a timestamp to the start of its bucket, `None` if that start
    /// is not representable
    #[inline]
    pub fn bucket_start(&self, time: i64) -> Option<i64> {
        time.checked_sub(time.rem_euclid(self.interval_secs))
    }

    fn position(&self, time: i64) -> Result<usize, usize> {
        match self.candles.last() {
            Some(last) if last.time == time => Ok(self.candles.len() - 1),
            Some(last) if last.time < time => Err(self.candles.len()),
            None => Err(0),
            Some(_) => self.candles.binary_search_by_key(&time, |c| c.time),
        }
    }

    fn place(&mut self, candle: Candle) -> Merge {
        match self.position(candle.time) {
            Ok(index) => {
                self.candles[index] = candle;
                Merge::Replaced
            }
            Err(index) if index == self.candles.len() => {
                self.candles.push(candle);
                Merge::Appended
            }
            Err(index) => {
                debug!(time = candle.time, index, "out-of-order candle inserted");
                self.candles.insert(index, candle);
                Merge::Inserted
            }
        }
    }

    fn evict(&mut self) -> usize {
        let excess = self.candles.len().saturating_sub(self.retention);
        if excess > 0 {
            self.candles.drain(..excess);
        }
        excess
    }
}

impl Default for CandleStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION, DEFAULT_INTERVAL_SECS)
    }
}
