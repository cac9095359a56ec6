//! Stateful N-pattern reversal analyzer

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::detectors::{
    check_reversal, detect_n_pattern, find_swing_points, Pattern, PriceField, ReversalSignal,
    SwingPoint,
};
use crate::params::{get_period, get_ratio, ParamMeta, ParameterizedAnalyzer};
use crate::{Period, Ratio, Result, ReversalAnalyzer, ReversalError, OHLCV};

// ============================================================
// CONFIG
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NPatternConfig {
    /// Minimum pattern move (fractional); also the swing amplitude filter
    pub reversal_threshold: Ratio,
    /// Candles on each side a swing point must dominate
    pub swing_window: Period,
    pub min_strength: Ratio,
    /// Shorter series are skipped without touching state
    pub min_candles: usize,
    pub price_field: PriceField,
}

impl Default for NPatternConfig {
    fn default() -> Self {
        Self {
            reversal_threshold: Ratio::new_const(0.003),
            swing_window: Period::new_const(2),
            min_strength: Ratio::new_const(0.5),
            min_candles: 10,
            price_field: PriceField::Close,
        }
    }
}

impl NPatternConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_candles == 0 {
            return Err(ReversalError::InvalidConfig(
                "n_pattern.min_candles must be > 0".into(),
            ));
        }
        Ok(())
    }
}

static N_PATTERN_PARAMS: &[ParamMeta] = &[
    ParamMeta::ratio(
        "reversal_threshold",
        0.003,
        (0.0005, 0.005, 0.0005),
        "Minimum pattern move and swing amplitude",
    ),
    ParamMeta::period("swing_window", 2.0, (2.0, 5.0, 1.0), "Swing point window size"),
    ParamMeta::ratio("min_strength", 0.5, (0.2, 0.5, 0.1), "Minimum pattern strength"),
];

impl ParameterizedAnalyzer for NPatternConfig {
    fn param_meta() -> &'static [ParamMeta] {
        N_PATTERN_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            reversal_threshold: get_ratio(params, "reversal_threshold", 0.003)?,
            swing_window: get_period(params, "swing_window", 2)?,
            min_strength: get_ratio(params, "min_strength", 0.5)?,
            ..Self::default()
        })
    }

    fn analyzer_name() -> &'static str {
        "n_pattern"
    }
}

// ============================================================
// STATE
// ============================================================

/// Cross-call state of one analyzer instance
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NPatternState {
    pub current_pattern: Option<Pattern>,
    /// What `current_pattern` held before the last detection
    pub previous_pattern: Option<Pattern>,
    /// Swing points from the most recent extraction
    pub swing_point_history: Vec<SwingPoint>,
    pub last_reversal_time: Option<DateTime<Utc>>,
    pub reversal_count: u64,
}

// ============================================================
// ANALYZER
// ============================================================

/// Detects pattern-direction changes as candles arrive.
///
/// Feed the full history once per new candle. Each call re-derives swing
/// points; when they form a pattern, the pattern slides into
/// `current_pattern` and is compared against the one it replaced.
#[derive(Debug, Clone, Default)]
pub struct NPatternAnalyzer {
    config: NPatternConfig,
    state: NPatternState,
}

impl NPatternAnalyzer {
    pub fn new(config: NPatternConfig) -> Self {
        Self::with_state(config, NPatternState::default())
    }

    /// Resume from previously extracted state
    pub fn with_state(config: NPatternConfig, state: NPatternState) -> Self {
        Self { config, state }
    }

    #[inline]
    pub fn config(&self) -> &NPatternConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> &NPatternState {
        &self.state
    }

    pub fn into_state(self) -> NPatternState {
        self.state
    }
}

impl ReversalAnalyzer for NPatternAnalyzer {
    type Event = ReversalSignal;

    fn min_candles(&self) -> usize {
        self.config.min_candles
    }

    fn analyze<T: OHLCV>(&mut self, candles: &[T]) -> Option<ReversalSignal> {
        let cfg = &self.config;
        if candles.len() < cfg.min_candles {
            debug!(candles = candles.len(), min = cfg.min_candles, "n_pattern warming up");
            return None;
        }

        self.state.swing_point_history = find_swing_points(
            candles,
            cfg.swing_window.get(),
            cfg.reversal_threshold.get(),
        );
        let pattern = detect_n_pattern(&self.state.swing_point_history, cfg.price_field)?;

        self.state.previous_pattern = self.state.current_pattern.replace(pattern);

        let signal = check_reversal(
            self.state.current_pattern.as_ref(),
            self.state.previous_pattern.as_ref(),
            cfg.reversal_threshold.get(),
            cfg.min_strength.get(),
        )?;

        self.state.reversal_count += 1;
        self.state.last_reversal_time = Some(signal.trigger_time);
        Some(signal)
    }

    fn reset(&mut self) {
        self.state = NPatternState::default();
    }
}
