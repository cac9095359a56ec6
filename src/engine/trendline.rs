//! Stateful trendline breakout engine

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::detectors::{
    check_breakout, find_pivots, identify_trend, weighted_trendline, Trend,
    FULL_CONFIDENCE_PIVOTS,
};
use crate::params::{get_period, get_ratio, ParamMeta, ParameterizedAnalyzer};
use crate::{
    Period, Ratio, Result, ReversalAnalyzer, ReversalError, ReversalEvent, ReversalType, OHLCV,
};

/// Minimum spacing between two emitted breakouts of one engine
pub const REVERSAL_COOLDOWN_MINUTES: i64 = 5;

/// Fewer candles inside the time window never produce a trend
pub const MIN_WINDOW_CANDLES: usize = 5;

// ============================================================
// CONFIG
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrendlineConfig {
    /// Lookback by timestamp, not candle count
    pub trend_window_hours: Period,
    pub min_pivot_distance: Period,
    pub breakout_threshold: Ratio,
    pub min_trend_points: Period,
    pub min_candles: usize,
}

impl Default for TrendlineConfig {
    fn default() -> Self {
        Self {
            trend_window_hours: Period::new_const(12),
            min_pivot_distance: Period::new_const(3),
            breakout_threshold: Ratio::new_const(0.001),
            min_trend_points: Period::new_const(2),
            min_candles: 10,
        }
    }
}

impl TrendlineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_candles == 0 {
            return Err(ReversalError::InvalidConfig(
                "trendline.min_candles must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Start of the lookback ending at `now`; `None` when it reaches past
    /// the representable time range and every candle is in the window.
    fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let hours = i64::try_from(self.trend_window_hours.get()).ok()?;
        now.checked_sub_signed(Duration::try_hours(hours)?)
    }
}

static TRENDLINE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("trend_window_hours", 12.0, (6.0, 12.0, 2.0), "Trend lookback in hours"),
    ParamMeta::period("min_pivot_distance", 3.0, (2.0, 3.0, 1.0), "Pivot dominance distance"),
    ParamMeta::ratio(
        "breakout_threshold",
        0.001,
        (0.0005, 0.002, 0.0005),
        "Close beyond the trendline needed to break out",
    ),
    ParamMeta::period("min_trend_points", 2.0, (2.0, 4.0, 1.0), "Pivots needed for a trendline"),
];

impl ParameterizedAnalyzer for TrendlineConfig {
    fn param_meta() -> &'static [ParamMeta] {
        TRENDLINE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            trend_window_hours: get_period(params, "trend_window_hours", 12)?,
            min_pivot_distance: get_period(params, "min_pivot_distance", 3)?,
            breakout_threshold: get_ratio(params, "breakout_threshold", 0.001)?,
            min_trend_points: get_period(params, "min_trend_points", 2)?,
            ..Self::default()
        })
    }

    fn analyzer_name() -> &'static str {
        "trendline"
    }
}

// ============================================================
// STATE & EVENTS
// ============================================================

/// Cross-call state, also the snapshot read by reporting
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendlineState {
    pub current_trend: Trend,
    pub trendline_value: Option<f64>,
    /// Latest candle time when `current_trend` last changed
    pub trend_start_time: Option<DateTime<Utc>>,
    pub last_reversal_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BreakoutEvent {
    pub reversal_type: ReversalType,
    pub from_trend: Trend,
    pub to_trend: Trend,
    /// Close of the breaking candle
    pub breakout_price: f64,
    pub trendline_value: f64,
    pub breakout_percent: f64,
    pub trigger_time: DateTime<Utc>,
    pub pivot_count: usize,
    pub confidence: f64,
}

impl ReversalEvent for BreakoutEvent {
    fn reversal_type(&self) -> ReversalType {
        self.reversal_type
    }

    fn trigger_time(&self) -> DateTime<Utc> {
        self.trigger_time
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

// ============================================================
// ENGINE
// ============================================================

/// Trendline breakout detector.
///
/// Each call looks at the last `trend_window_hours` of candles, fits a
/// trendline through the pivots of the prevailing trend and reports a close
/// beyond it. Breakouts closer than [`REVERSAL_COOLDOWN_MINUTES`] to the
/// previous one are suppressed.
#[derive(Debug, Clone, Default)]
pub struct TrendlineEngine {
    config: TrendlineConfig,
    state: TrendlineState,
}

impl TrendlineEngine {
    pub fn new(config: TrendlineConfig) -> Self {
        Self::with_state(config, TrendlineState::default())
    }

    pub fn with_state(config: TrendlineConfig, state: TrendlineState) -> Self {
        Self { config, state }
    }

    #[inline]
    pub fn config(&self) -> &TrendlineConfig {
        &self.config
    }

    /// Current trend snapshot. May lag the market while pivots are scarce.
    #[inline]
    pub fn trend_info(&self) -> &TrendlineState {
        &self.state
    }

    pub fn into_state(self) -> TrendlineState {
        self.state
    }

    fn set_trend(&mut self, trend: Trend, at: DateTime<Utc>) {
        if self.state.current_trend != trend {
            self.state.current_trend = trend;
            self.state.trend_start_time = Some(at);
        }
    }

    fn in_cooldown(&self, at: DateTime<Utc>) -> bool {
        self.state
            .last_reversal_time
            .is_some_and(|last| at - last < Duration::minutes(REVERSAL_COOLDOWN_MINUTES))
    }
}

impl ReversalAnalyzer for TrendlineEngine {
    type Event = BreakoutEvent;

    fn min_candles(&self) -> usize {
        self.config.min_candles
    }

    fn analyze<T: OHLCV>(&mut self, candles: &[T]) -> Option<BreakoutEvent> {
        let cfg = self.config;
        if candles.len() < cfg.min_candles {
            debug!(candles = candles.len(), min = cfg.min_candles, "trendline warming up");
            return None;
        }
        let latest = candles.last()?;
        let now = latest.time();

        let first = cfg
            .window_start(now)
            .map_or(0, |start| candles.partition_point(|c| c.time() < start));
        let window = &candles[first..];
        if window.len() < MIN_WINDOW_CANDLES {
            debug!(window = window.len(), "trend window too short");
            return None;
        }

        let trend = identify_trend(window);
        let (Some(side), Some(to_trend)) = (trend.pivot_side(), trend.opposite()) else {
            self.set_trend(Trend::Neutral, now);
            return None;
        };

        let pivots = find_pivots(window, side, cfg.min_pivot_distance.get());
        if pivots.len() < cfg.min_trend_points.get() {
            debug!(pivots = pivots.len(), ?trend, "not enough pivots, keeping trend");
            return None;
        }

        let trendline = weighted_trendline(&pivots, window.len() - 1, cfg.min_trend_points.get())?;
        let price = latest.close();

        if !check_breakout(price, trendline, trend, cfg.breakout_threshold.get()) {
            self.set_trend(trend, now);
            self.state.trendline_value = Some(trendline);
            return None;
        }

        if self.in_cooldown(now) {
            debug!(%now, "breakout inside cooldown");
            return None;
        }

        let reversal_type = trend.breakout_reversal()?;
        self.state.last_reversal_time = Some(now);
        self.set_trend(to_trend, now);

        let pivot_count = pivots.len();
        let event = BreakoutEvent {
            reversal_type,
            from_trend: trend,
            to_trend,
            breakout_price: price,
            trendline_value: trendline,
            breakout_percent: (price - trendline).abs() / trendline * 100.0,
            trigger_time: now,
            pivot_count,
            confidence: (pivot_count as f64 / FULL_CONFIDENCE_PIVOTS).min(1.0),
        };

        info!(
            ?reversal_type,
            price,
            trendline,
            pivots = pivot_count,
            "trendline breakout"
        );
        Some(event)
    }

    fn reset(&mut self) {
        self.state = TrendlineState::default();
    }
}
