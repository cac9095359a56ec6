//! Regression trend identification

use tracing::debug;

use super::helpers::{mean, ols_slope, TREND_SLOPE_THRESHOLD_PCT};
use super::swing::Extremum;
use crate::{ReversalType, OHLCV};

/// Shortest window the trend identifier classifies
pub const MIN_TREND_CANDLES: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Trend {
    Rising,
    Falling,
    #[default]
    Neutral,
}

impl Trend {
    /// The trend a breakout flips to; `Neutral` has none
    #[inline]
    pub fn opposite(self) -> Option<Trend> {
        match self {
            Trend::Rising => Some(Trend::Falling),
            Trend::Falling => Some(Trend::Rising),
            Trend::Neutral => None,
        }
    }

    /// Pivot side that defines this trend's trendline
    ///
    /// A falling trend is capped by lower highs, a rising one supported by higher lows.
    #[inline]
    pub fn pivot_side(self) -> Option<Extremum> {
        match self {
            Trend::Rising => Some(Extremum::Low),
            Trend::Falling => Some(Extremum::High),
            Trend::Neutral => None,
        }
    }

    /// Reversal produced by breaking out of this trend
    #[inline]
    pub fn breakout_reversal(self) -> Option<ReversalType> {
        match self {
            Trend::Rising => Some(ReversalType::Bearish),
            Trend::Falling => Some(ReversalType::Bullish),
            Trend::Neutral => None,
        }
    }
}

/// Classify the window by the OLS slope of its closes, as a percent of the mean close.
pub fn identify_trend<T: OHLCV>(candles: &[T]) -> Trend {
    if candles.len() < MIN_TREND_CANDLES {
        return Trend::Neutral;
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close()).collect();
    let (Some(slope), Some(avg)) = (ols_slope(&closes), mean(&closes)) else {
        return Trend::Neutral;
    };
    if avg == 0.0 {
        return Trend::Neutral;
    }

    let slope_percent = slope / avg * 100.0;
    let trend = if slope_percent > TREND_SLOPE_THRESHOLD_PCT {
        Trend::Rising
    } else if slope_percent < -TREND_SLOPE_THRESHOLD_PCT {
        Trend::Falling
    } else {
        Trend::Neutral
    };

    debug!(slope_percent, ?trend, "trend identified");
    trend
}
