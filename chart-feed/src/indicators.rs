/// Technical indicators over a candle sequence
///
/// Every function is pure: it reads a candle slice and returns a freshly
/// allocated series. Degenerate configuration (zero period, period longer than
/// the data) yields an empty series rather than an error.
use crate::types::Candle;
use serde::{Deserialize, Serialize};

/// Indicator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Bollinger,
}

impl IndicatorKind {
    pub fn label(&self) -> &'static str {
        match self {
            IndicatorKind::Sma => "SMA",
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Bollinger => "BB",
        }
    }
}

/// Single value of a line indicator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinePoint {
    pub time: i64,
    pub value: f64,
}

/// Single value of a band indicator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandPoint {
    pub time: i64,
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Derived series, replaced wholesale on every recompute
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "points", rename_all = "lowercase")]
pub enum IndicatorSeries {
    Line(Vec<LinePoint>),
    Bands(Vec<BandPoint>),
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        match self {
            IndicatorSeries::Line(points) => points.len(),
            IndicatorSeries::Bands(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time of the most recent point
    pub fn last_time(&self) -> Option<i64> {
        match self {
            IndicatorSeries::Line(points) => points.last().map(|p| p.time),
            IndicatorSeries::Bands(points) => points.last().map(|p| p.time),
        }
    }
}

/// Simple Moving Average of closes
///
/// Each point is stamped with the time of the last candle in its window.
/// Output length is `len - period + 1`.
pub fn sma(candles: &[Candle], period: usize) -> Vec<LinePoint> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }

    // Summed per window: a non-finite close or an outlier stays in the windows holding it
    candles
        .windows(period)
        .map(|window| {
            let sum: f64 = window.iter().map(|c| c.close).sum();
            LinePoint {
                time: window[period - 1].time,
                value: sum / period as f64,
            }
        })
        .collect()
}

/// Exponential Moving Average of closes
///
/// Seeded with the first close, so the series covers every candle. Early values
/// are unstable until roughly `period` candles have been folded in.
pub fn ema(candles: &[Candle], period: usize) -> Vec<LinePoint> {
    if period == 0 || candles.is_empty() {
        return Vec::new();
    }

    // Smoothing factor: 2 / (period + 1)
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut points = Vec::with_capacity(candles.len());
    let mut value = candles[0].close;
    points.push(LinePoint {
        time: candles[0].time,
        value,
    });

    for candle in &candles[1..] {
        value = candle.close * alpha + value * (1.0 - alpha);
        points.push(LinePoint {
            time: candle.time,
            value,
        });
    }

    points
}

/// Bollinger Bands: SMA middle band offset by `std_dev_multiplier` population
/// standard deviations of the same window
pub fn bollinger(candles: &[Candle], period: usize, std_dev_multiplier: f64) -> Vec<BandPoint> {
    if period == 0 {
        return Vec::new();
    }

    sma(candles, period)
        .into_iter()
        .zip(candles.windows(period))
        .map(|(middle, window)| {
            let variance = window
                .iter()
                .map(|c| {
                    let diff = c.close - middle.value;
                    diff * diff
                })
                .sum::<f64>()
                / period as f64;
            let offset = variance.sqrt() * std_dev_multiplier;

            BandPoint {
                time: middle.time,
                upper: middle.value + offset,
                middle: middle.value,
                lower: middle.value - offset,
            }
        })
        .collect()
}

/// Compute the series an overlay describes
pub fn compute(
    kind: IndicatorKind,
    period: usize,
    std_dev_multiplier: f64,
    candles: &[Candle],
) -> IndicatorSeries {
    match kind {
        IndicatorKind::Sma => IndicatorSeries::Line(sma(candles, period)),
        IndicatorKind::Ema => IndicatorSeries::Line(ema(candles, period)),
        IndicatorKind::Bollinger => {
            IndicatorSeries::Bands(bollinger(candles, period, std_dev_multiplier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle::flat(i as i64 * 60, close))
            .collect()
    }

    fn values(points: &[LinePoint]) -> Vec<f64> {
        points.iter().map(|p| p.value).collect()
    }

    #[test]
    fn test_sma_calculation() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let points = sma(&candles, 3);

        assert_eq!(values(&points), vec![2.0, 3.0, 4.0]);
        assert_eq!(points[0].time, 120);
        assert_eq!(points[2].time, 240);
    }

    #[test]
    fn test_sma_degenerate_periods() {
        let candles = candles_from_closes(&[1.0, 2.0]);
        assert!(sma(&candles, 3).is_empty());
        assert!(sma(&candles, 0).is_empty());
        assert!(sma(&[], 1).is_empty());
        assert_eq!(values(&sma(&candles, 1)), vec![1.0, 2.0]);
    }

    #[test]
    fn test_ema_recurrence() {
        let candles = candles_from_closes(&[10.0, 20.0, 30.0]);
        let points = ema(&candles, 3);

        // alpha = 2 / (3 + 1) = 0.5
        // 10, 20 * 0.5 + 10 * 0.5 = 15, 30 * 0.5 + 15 * 0.5 = 22.5
        assert_eq!(values(&points), vec![10.0, 15.0, 22.5]);
    }

    #[test]
    fn test_ema_covers_every_candle() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ema(&candles, 10).len(), 4);
        assert!(ema(&candles, 0).is_empty());
        assert!(ema(&[], 3).is_empty());
    }

    #[test]
    fn test_bollinger_values() {
        let candles = candles_from_closes(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let bands = bollinger(&candles, 8, 2.0);

        // mean 5, population std dev 2
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].middle, 5.0);
        assert!((bands[0].upper - 9.0).abs() < 1e-12);
        assert!((bands[0].lower - 1.0).abs() < 1e-12);
        assert_eq!(bands[0].time, 7 * 60);
    }

    #[test]
    fn test_bollinger_length_matches_sma() {
        let candles = candles_from_closes(&[1.0, 3.0, 2.0, 5.0, 4.0, 6.0]);
        assert_eq!(bollinger(&candles, 4, 2.0).len(), sma(&candles, 4).len());
        assert!(bollinger(&candles, 7, 2.0).is_empty());
        assert!(bollinger(&candles, 0, 2.0).is_empty());
    }

    #[test]
    fn test_bollinger_band_order() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let len = rng.random_range(1..120);
            let closes: Vec<f64> = (0..len).map(|_| rng.random_range(0.01..50_000.0)).collect();
            let period = rng.random_range(1..=len);
            let multiplier = rng.random_range(0.0..4.0);

            let candles = candles_from_closes(&closes);
            for band in bollinger(&candles, period, multiplier) {
                assert!(band.upper >= band.middle, "{band:?}");
                assert!(band.middle >= band.lower, "{band:?}");
            }
        }
    }

    #[test]
    fn test_nan_close_only_affects_its_windows() {
        let candles = candles_from_closes(&[1.0, f64::NAN, 3.0, 4.0, 5.0]);
        let points = values(&sma(&candles, 2));

        assert_eq!(points.len(), 4);
        assert!(points[0].is_nan());
        assert!(points[1].is_nan());
        assert_eq!(&points[2..], &[3.5, 4.5]);
    }

    #[test]
    fn test_infinite_close_only_affects_its_windows() {
        let candles = candles_from_closes(&[f64::INFINITY, 1.0, 2.0]);
        assert_eq!(values(&sma(&candles, 1)), vec![f64::INFINITY, 1.0, 2.0]);
    }

    #[test]
    fn test_outlier_leaving_window_keeps_precision() {
        let candles = candles_from_closes(&[1e17, 1.0, 1.0, 1.0]);
        assert_eq!(values(&sma(&candles, 2)), vec![5e16, 1.0, 1.0]);

        let bands = bollinger(&candles, 2, 2.0);
        assert_eq!(bands[2].middle, 1.0);
        assert_eq!(bands[2].upper, 1.0);
        assert_eq!(bands[2].lower, 1.0);
    }

    #[test]
    fn test_compute_dispatch() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(compute(IndicatorKind::Sma, 3, 0.0, &candles).len(), 3);
        assert_eq!(compute(IndicatorKind::Ema, 3, 0.0, &candles).len(), 5);
        assert!(matches!(
            compute(IndicatorKind::Bollinger, 3, 2.0, &candles),
            IndicatorSeries::Bands(ref bands) if bands.len() == 3
        ));
    }
}
