//! Trade marker alignment
//!
//! Trades arrive with arbitrary timestamps; charts can only annotate candles.
//! Each trade is bound to the candle closest in time, unless that candle is
//! further away than the tolerance.

use crate::types::{Candle, Side, TradeMarker};
use serde::{Deserialize, Serialize};

/// Maximum distance between a trade and the candle it is drawn on
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub enum MarkerTolerance {
    /// Flat cutoff, independent of the chart timeframe
    Seconds(u64),
    /// Cutoff as a multiple of the candle interval
    CandleIntervals(f64),
}

impl MarkerTolerance {
    /// Tolerance in seconds for a chart with the given candle interval
    pub fn resolve(&self, interval_secs: i64) -> u64 {
        match *self {
            MarkerTolerance::Seconds(secs) => secs,
            MarkerTolerance::CandleIntervals(factor) => {
                (interval_secs as f64 * factor).max(0.0).round() as u64
            }
        }
    }
}

impl Default for MarkerTolerance {
    fn default() -> Self {
        MarkerTolerance::Seconds(60)
    }
}

/// Trade bound to its nearest candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedMarker {
    pub trade: TradeMarker,
    pub candle: Candle,
}

/// Where a marker sits relative to its bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerPosition {
    AboveBar,
    BelowBar,
}

/// Renderable annotation for one aligned trade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerAnnotation {
    /// Time of the candle the marker is drawn on
    pub time: i64,
    pub side: Side,
    pub price: f64,
    pub position: MarkerPosition,
    pub text: String,
}

/// Bind each trade to the closest candle within `max_distance_secs`
///
/// `candles` must be ascending by `time`, as returned by
/// [`CandleStore::snapshot`](crate::candles::CandleStore::snapshot). Trades
/// without a candle in range are dropped. Output is ordered by trade time.
pub fn align(
    trades: &[TradeMarker],
    candles: &[Candle],
    max_distance_secs: u64,
) -> Vec<AlignedMarker> {
    let mut aligned: Vec<AlignedMarker> = trades
        .iter()
        .filter_map(|trade| {
            let candle = nearest_candle(candles, trade.time)?;
            (trade.time.abs_diff(candle.time) <= max_distance_secs).then_some(AlignedMarker {
                trade: *trade,
                candle: *candle,
            })
        })
        .collect();

    aligned.sort_by_key(|marker| marker.trade.time);
    aligned
}

/// Turn aligned trades into chart annotations
pub fn annotate(aligned: &[AlignedMarker]) -> Vec<MarkerAnnotation> {
    aligned
        .iter()
        .map(|marker| {
            let position = match marker.trade.side {
                Side::Buy => MarkerPosition::BelowBar,
                Side::Sell => MarkerPosition::AboveBar,
            };
            MarkerAnnotation {
                time: marker.candle.time,
                side: marker.trade.side,
                price: marker.trade.price,
                position,
                text: format!("{} @ {:.2}", marker.trade.side, marker.trade.price),
            }
        })
        .collect()
}

/// Closest candle by time; ties go to the earlier candle
fn nearest_candle(candles: &[Candle], time: i64) -> Option<&Candle> {
    let index = candles.partition_point(|c| c.time < time);
    let after = candles.get(index);
    let before = index.checked_sub(1).and_then(|i| candles.get(i));

    match (before, after) {
        (Some(before), Some(after)) => {
            if time.abs_diff(before.time) <= time.abs_diff(after.time) {
                Some(before)
            } else {
                Some(after)
            }
        }
        (before, after) => before.or(after),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(time: i64, side: Side) -> TradeMarker {
        TradeMarker {
            time,
            side,
            price: 100.0,
        }
    }

    fn candles(times: &[i64]) -> Vec<Candle> {
        times.iter().map(|&t| Candle::flat(t, 100.0)).collect()
    }

    #[test]
    fn test_align_within_tolerance() {
        let candles = candles(&[100, 200]);
        let trades = [trade(105, Side::Buy)];

        let aligned = align(&trades, &candles, 10);
        assert_eq!(aligned.len(), 1);
        assert_eq!(aligned[0].candle.time, 100);

        assert!(align(&trades, &candles, 3).is_empty());
    }

    #[test]
    fn test_align_picks_nearest_side() {
        let candles = candles(&[100, 200, 300]);

        struct TestCase {
            time: i64,
            expected: Option<i64>,
        }

        let tests = vec![
            // TC0: before the first candle
            TestCase { time: 60, expected: Some(100) },
            // TC1: exact match
            TestCase { time: 200, expected: Some(200) },
            // TC2: closer to the later candle
            TestCase { time: 180, expected: Some(200) },
            // TC3: equidistant resolves to the earlier candle
            TestCase { time: 250, expected: Some(200) },
            // TC4: after the last candle
            TestCase { time: 340, expected: Some(300) },
            // TC5: too far after the last candle
            TestCase { time: 500, expected: None },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let aligned = align(&[trade(test.time, Side::Sell)], &candles, 60);
            let actual = aligned.first().map(|m| m.candle.time);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_align_distance_equal_to_tolerance_is_kept() {
        let aligned = align(&[trade(110, Side::Buy)], &candles(&[100]), 10);
        assert_eq!(aligned.len(), 1);
    }

    #[test]
    fn test_align_output_sorted_by_trade_time() {
        let candles = candles(&[100, 200, 300]);
        let trades = [
            trade(301, Side::Sell),
            trade(99, Side::Buy),
            trade(5_000, Side::Buy),
            trade(202, Side::Sell),
        ];

        let aligned = align(&trades, &candles, 30);
        let times: Vec<i64> = aligned.iter().map(|m| m.trade.time).collect();
        assert_eq!(times, vec![99, 202, 301]);
    }

    #[test]
    fn test_align_without_candles() {
        assert!(align(&[trade(100, Side::Buy)], &[], u64::MAX).is_empty());
    }

    #[test]
    fn test_tolerance_resolve() {
        assert_eq!(MarkerTolerance::Seconds(10).resolve(86_400), 10);
        assert_eq!(MarkerTolerance::CandleIntervals(0.5).resolve(60), 30);
        assert_eq!(MarkerTolerance::CandleIntervals(0.5).resolve(86_400), 43_200);
        assert_eq!(MarkerTolerance::CandleIntervals(-1.0).resolve(60), 0);
    }

    #[test]
    fn test_annotate_positions() {
        let candles = candles(&[100]);
        let aligned = align(
            &[trade(101, Side::Buy), trade(102, Side::Sell)],
            &candles,
            10,
        );

        let annotations = annotate(&aligned);
        assert_eq!(annotations[0].position, MarkerPosition::BelowBar);
        assert_eq!(annotations[0].time, 100);
        assert_eq!(annotations[0].text, "Buy @ 100.00");
        assert_eq!(annotations[1].position, MarkerPosition::AboveBar);
    }
}
