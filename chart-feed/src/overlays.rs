//! Indicator overlay configuration
//!
//! The registry only holds what the user configured. Series are derived on
//! demand by [`ChartFeed`](crate::feed::ChartFeed), and only for visible
//! overlays.

use crate::error::FeedError;
use crate::indicators::{self, IndicatorKind, IndicatorSeries};
use crate::types::Candle;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default Bollinger width in standard deviations
pub const DEFAULT_STD_DEV_MULTIPLIER: f64 = 2.0;

/// User configured indicator overlay
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorSpec {
    pub id: String,
    pub kind: IndicatorKind,
    pub period: usize,
    /// Only read for [`IndicatorKind::Bollinger`]
    pub std_dev_multiplier: f64,
    pub visible: bool,
    pub color: String,
}

impl IndicatorSpec {
    pub fn new(id: impl Into<String>, kind: IndicatorKind, period: usize) -> Self {
        let color = match kind {
            IndicatorKind::Sma => "#FFC107",
            IndicatorKind::Ema => "#03A9F4",
            IndicatorKind::Bollinger => "#9C27B0",
        };
        Self {
            id: id.into(),
            kind,
            period,
            std_dev_multiplier: DEFAULT_STD_DEV_MULTIPLIER,
            visible: true,
            color: color.to_string(),
        }
    }

    pub fn sma(id: impl Into<String>, period: usize) -> Self {
        Self::new(id, IndicatorKind::Sma, period)
    }

    pub fn ema(id: impl Into<String>, period: usize) -> Self {
        Self::new(id, IndicatorKind::Ema, period)
    }

    pub fn bollinger(id: impl Into<String>, period: usize, std_dev_multiplier: f64) -> Self {
        Self::new(id, IndicatorKind::Bollinger, period).with_std_dev_multiplier(std_dev_multiplier)
    }

    pub fn with_std_dev_multiplier(mut self, multiplier: f64) -> Self {
        self.std_dev_multiplier = multiplier;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Display label, e.g. `SMA(20)` or `BB(20, 2)`
    pub fn label(&self) -> String {
        match self.kind {
            IndicatorKind::Bollinger => {
                format!("{}({}, {})", self.kind.label(), self.period, self.std_dev_multiplier)
            }
            _ => format!("{}({})", self.kind.label(), self.period),
        }
    }

    /// Series this overlay draws over `candles`
    pub fn compute(&self, candles: &[Candle]) -> IndicatorSeries {
        indicators::compute(self.kind, self.period, self.std_dev_multiplier, candles)
    }
}

/// Insertion-ordered set of overlay specs, unique by id
#[derive(Debug, Clone, Default)]
pub struct OverlayRegistry {
    specs: IndexMap<String, IndicatorSpec>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, spec: IndicatorSpec) -> Result<(), FeedError> {
        if self.specs.contains_key(&spec.id) {
            return Err(FeedError::DuplicateOverlay(spec.id));
        }
        self.specs.insert(spec.id.clone(), spec);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<IndicatorSpec, FeedError> {
        self.specs
            .shift_remove(id)
            .ok_or_else(|| FeedError::UnknownOverlay(id.to_string()))
    }

    /// Flip visibility, returning the new state
    pub fn toggle_visible(&mut self, id: &str) -> Result<bool, FeedError> {
        let spec = self.spec_mut(id)?;
        spec.visible = !spec.visible;
        Ok(spec.visible)
    }

    pub fn set_period(&mut self, id: &str, period: usize) -> Result<(), FeedError> {
        self.spec_mut(id)?.period = period;
        Ok(())
    }

    pub fn set_std_dev_multiplier(&mut self, id: &str, multiplier: f64) -> Result<(), FeedError> {
        self.spec_mut(id)?.std_dev_multiplier = multiplier;
        Ok(())
    }

    pub fn set_color(&mut self, id: &str, color: impl Into<String>) -> Result<(), FeedError> {
        self.spec_mut(id)?.color = color.into();
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&IndicatorSpec> {
        self.specs.get(id)
    }

    /// Visible specs in the order they were added
    pub fn list_visible(&self) -> Vec<IndicatorSpec> {
        self.specs.values().filter(|spec| spec.visible).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndicatorSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    fn spec_mut(&mut self, id: &str) -> Result<&mut IndicatorSpec, FeedError> {
        self.specs
            .get_mut(id)
            .ok_or_else(|| FeedError::UnknownOverlay(id.to_string()))
    }
}
