//! # turnpoint - price reversal detection
//!
//! Detects directional reversals in a single price series with two independent heuristics:
//!
//! - **N-patterns**: swing points (local highs/lows surviving an amplitude filter) grouped into
//!   LOW-HIGH-LOW / HIGH-LOW-HIGH motifs. A change of motif direction is a reversal.
//! - **Trendline breakouts**: the prevailing trend is found by linear regression, a trendline is
//!   fitted through the pivots that define it, and a close beyond the line is a reversal.
//!
//! A replay [`backtest`] harness scores parameter combinations against labeled reversals.
//!
//! ## Quick Start
//!
//! ```rust
//! use turnpoint::prelude::*;
//!
//! let mut monitor = MonitorBuilder::new()
//!     .with_n_pattern(NPatternConfig::default())
//!     .with_trendline(TrendlineConfig::default())
//!     .build()
//!     .unwrap();
//!
//! // Call once per newly closed candle with the full history up to "now"
//! let candles: Vec<Candle> = vec![];
//! let reversals = monitor.on_candles(&candles).unwrap();
//! assert!(reversals.is_empty());
//! ```

use chrono::{DateTime, Utc};

pub mod backtest;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod params;

pub mod prelude {
    pub use crate::{
        // Backtesting
        backtest::{
            BacktestConfig, BacktestResult, Backtester, GridReport, LabelDirection,
            LabeledReversal, NPatternGrid, TrendlineGrid, TrendlineParams,
        },
        // Configuration
        config::Settings,
        // Stateless detectors
        detectors::*,
        // Stateful analyzers
        engine::{
            BreakoutEvent, MonitorBuilder, NPatternAnalyzer, NPatternConfig, NPatternState,
            Reversal, ReversalMonitor, TrendlineConfig, TrendlineEngine, TrendlineState,
        },
        // Parameters
        params::{get_period, get_ratio, ParamMeta, ParamType, ParameterizedAnalyzer},
        // Types
        Candle,
        OHLCVExt,
        Period,
        PricePoint,
        Ratio,
        // Errors
        Result,
        ReversalAnalyzer,
        ReversalError,
        ReversalEvent,
        ReversalType,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ReversalError>;

/// Errors raised at the configuration and input boundary.
///
/// Detection itself never fails: missing data yields `None` or an empty result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReversalError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },

    #[error("Invalid label: {0}")]
    InvalidLabel(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0 (thresholds, strengths)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(ReversalError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ReversalError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0): window sizes, distances, hours, point counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(ReversalError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core candle data trait. Series are expected in ascending time order.
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
    fn time(&self) -> DateTime<Utc>;
}

impl<T: OHLCV + ?Sized> OHLCV for &T {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn volume(&self) -> f64 {
        (**self).volume()
    }

    fn time(&self) -> DateTime<Utc> {
        (**self).time()
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        let values = [self.open(), self.high(), self.low(), self.close()];
        if values.iter().any(|v| v.is_nan()) {
            return Err(ReversalError::InvalidCandle {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(ReversalError::InvalidCandle {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(ReversalError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        if values.iter().any(|v| *v < 0.0) || self.volume() < 0.0 {
            return Err(ReversalError::InvalidCandle {
                index: 0,
                reason: "negative price or volume",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV + ?Sized> OHLCVExt for T {}

/// One fixed-period OHLC observation
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

impl Candle {
    pub fn new(time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume: 0,
        }
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume as f64
    }

    fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

/// A single quoted price. Raw price histories run through the same
/// detectors with open = high = low = close = price.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: f64,
}

impl OHLCV for PricePoint {
    fn open(&self) -> f64 {
        self.price
    }

    fn high(&self) -> f64 {
        self.price
    }

    fn low(&self) -> f64 {
        self.price
    }

    fn close(&self) -> f64 {
        self.price
    }

    fn volume(&self) -> f64 {
        0.0
    }

    fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

// ============================================================
// REVERSAL EVENTS
// ============================================================

/// Direction of a detected reversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ReversalType {
    /// Falling to rising
    Bullish,
    /// Rising to falling
    Bearish,
}

impl ReversalType {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, ReversalType::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, ReversalType::Bearish)
    }
}

/// Common view over the events emitted by the analyzers
pub trait ReversalEvent {
    fn reversal_type(&self) -> ReversalType;
    fn trigger_time(&self) -> DateTime<Utc>;
    /// Confidence score 0.0..=1.0
    fn confidence(&self) -> f64;
}

/// Stateful analyzer fed the full candle history once per new candle.
///
/// Implementations keep cross-call state, so calls for one series must be
/// made in time order from a single owner.
pub trait ReversalAnalyzer {
    type Event: ReversalEvent;

    /// Shortest series for which [`ReversalAnalyzer::analyze`] can emit anything
    fn min_candles(&self) -> usize;

    fn analyze<T: OHLCV>(&mut self, candles: &[T]) -> Option<Self::Event>;

    /// Drop all cross-call state, keeping the configuration
    fn reset(&mut self);
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 19, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.003).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(48).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_ratio_deserialize_rejects_out_of_range() {
        let ok: Ratio = serde_json::from_str("0.25").unwrap();
        assert_eq!(ok.get(), 0.25);
        assert!(serde_json::from_str::<Ratio>("1.5").is_err());
        assert!(serde_json::from_str::<Period>("0").is_err());
    }

    #[test]
    fn test_candle_validate() {
        let good = Candle::new(t0(), 100.0, 101.0, 99.0, 100.5);
        assert!(good.validate().is_ok());

        let inverted = Candle::new(t0(), 100.0, 99.0, 101.0, 100.5);
        assert!(matches!(
            inverted.validate(),
            Err(ReversalError::InvalidCandle { reason: "high < low", .. })
        ));

        let nan = Candle::new(t0(), f64::NAN, 101.0, 99.0, 100.5);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_price_point_is_flat_candle() {
        let p = PricePoint {
            time: t0(),
            price: 2350.5,
        };
        assert_eq!(p.high(), p.low());
        assert_eq!(p.close(), 2350.5);
        assert_eq!(OHLCVExt::range(&p), 0.0);
    }

    #[test]
    fn test_candle_serde_iso_time() {
        let json = r#"{"time":"2026-02-19T00:05:00Z","open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":42}"#;
        let candle: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.time, t0() + chrono::Duration::minutes(5));
        assert_eq!(candle.volume, 42);
    }
}
