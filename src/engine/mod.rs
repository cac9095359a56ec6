//! Stateful analyzers and the monitor that drives them
//!
//! Both analyzers are fed the full candle history once per newly closed
//! candle. They keep their own cross-call state, so one instance belongs to
//! one monitored series.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::detectors::ReversalSignal;
use crate::{OHLCVExt, Result, ReversalAnalyzer, ReversalError, ReversalEvent, ReversalType, OHLCV};

pub mod n_pattern;
pub mod trendline;

pub use n_pattern::{NPatternAnalyzer, NPatternConfig, NPatternState};
pub use trendline::{
    BreakoutEvent, TrendlineConfig, TrendlineEngine, TrendlineState, REVERSAL_COOLDOWN_MINUTES,
};

// ============================================================
// REVERSAL
// ============================================================

/// Event emitted by a [`ReversalMonitor`]
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Reversal {
    NPattern(ReversalSignal),
    Breakout(BreakoutEvent),
}

impl ReversalEvent for Reversal {
    fn reversal_type(&self) -> ReversalType {
        match self {
            Reversal::NPattern(s) => s.reversal_type,
            Reversal::Breakout(b) => b.reversal_type,
        }
    }

    fn trigger_time(&self) -> DateTime<Utc> {
        match self {
            Reversal::NPattern(s) => s.trigger_time,
            Reversal::Breakout(b) => b.trigger_time,
        }
    }

    fn confidence(&self) -> f64 {
        match self {
            Reversal::NPattern(s) => s.confidence,
            Reversal::Breakout(b) => b.confidence,
        }
    }
}

// ============================================================
// MONITOR
// ============================================================

/// Runs the enabled analyzers over one candle series
#[derive(Debug, Clone)]
pub struct ReversalMonitor {
    n_pattern: Option<NPatternAnalyzer>,
    trendline: Option<TrendlineEngine>,
    validate_data: bool,
}

impl ReversalMonitor {
    /// Analyze the history up to the newest candle.
    ///
    /// Returns the reversals emitted by this call, N-pattern first.
    pub fn on_candles<T: OHLCV>(&mut self, candles: &[T]) -> Result<Vec<Reversal>> {
        if self.validate_data {
            validate_candles(candles)?;
        }

        let mut reversals = Vec::new();
        if let Some(analyzer) = self.n_pattern.as_mut() {
            reversals.extend(analyzer.analyze(candles).map(Reversal::NPattern));
        }
        if let Some(engine) = self.trendline.as_mut() {
            reversals.extend(engine.analyze(candles).map(Reversal::Breakout));
        }

        if !reversals.is_empty() {
            info!(count = reversals.len(), candles = candles.len(), "reversals emitted");
        }
        Ok(reversals)
    }

    /// Shortest history any enabled analyzer acts on
    pub fn min_candles(&self) -> usize {
        let n = self.n_pattern.as_ref().map(|a| a.min_candles());
        let t = self.trendline.as_ref().map(|e| e.min_candles());
        n.into_iter().chain(t).min().unwrap_or(0)
    }

    #[inline]
    pub fn n_pattern(&self) -> Option<&NPatternAnalyzer> {
        self.n_pattern.as_ref()
    }

    #[inline]
    pub fn trendline(&self) -> Option<&TrendlineEngine> {
        self.trendline.as_ref()
    }

    /// Clear cross-call state of every analyzer
    pub fn reset(&mut self) {
        if let Some(analyzer) = self.n_pattern.as_mut() {
            analyzer.reset();
        }
        if let Some(engine) = self.trendline.as_mut() {
            engine.reset();
        }
        debug!("monitor reset");
    }
}

/// Check every candle and that times strictly ascend
fn validate_candles<T: OHLCV>(candles: &[T]) -> Result<()> {
    for (i, candle) in candles.iter().enumerate() {
        candle.validate().map_err(|e| match e {
            ReversalError::InvalidCandle { reason, .. } => {
                ReversalError::InvalidCandle { index: i, reason }
            },
            other => other,
        })?;
    }
    if let Some(i) = candles.windows(2).position(|w| w[1].time() <= w[0].time()) {
        return Err(ReversalError::InvalidCandle {
            index: i + 1,
            reason: "time not ascending",
        });
    }
    Ok(())
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating ReversalMonitor instances
#[derive(Debug, Clone, Default)]
pub struct MonitorBuilder {
    n_pattern: Option<NPatternAnalyzer>,
    trendline: Option<TrendlineEngine>,
    validate_data: bool,
}

impl MonitorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable N-pattern detection
    pub fn with_n_pattern(mut self, config: NPatternConfig) -> Self {
        self.n_pattern = Some(NPatternAnalyzer::new(config));
        self
    }

    /// Enable N-pattern detection resuming from saved state
    pub fn n_pattern_analyzer(mut self, analyzer: NPatternAnalyzer) -> Self {
        self.n_pattern = Some(analyzer);
        self
    }

    /// Enable trendline breakout detection
    pub fn with_trendline(mut self, config: TrendlineConfig) -> Self {
        self.trendline = Some(TrendlineEngine::new(config));
        self
    }

    pub fn trendline_engine(mut self, engine: TrendlineEngine) -> Self {
        self.trendline = Some(engine);
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.validate_data = enable;
        self
    }

    /// Build the monitor
    pub fn build(self) -> Result<ReversalMonitor> {
        if let Some(analyzer) = &self.n_pattern {
            analyzer.config().validate()?;
        }
        if let Some(engine) = &self.trendline {
            engine.config().validate()?;
        }
        Ok(ReversalMonitor {
            n_pattern: self.n_pattern,
            trendline: self.trendline,
            validate_data: self.validate_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;
    use chrono::{Duration, TimeZone};

    fn series(n: usize) -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 19, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let c = 100.0 + 0.5 * i as f64;
                Candle::new(t0 + Duration::minutes(5 * i as i64), c, c + 0.5, c - 0.5, c)
            })
            .collect()
    }

    #[test]
    fn test_builder_empty_monitor() {
        let mut monitor = MonitorBuilder::new().build().unwrap();
        assert_eq!(monitor.min_candles(), 0);
        assert!(monitor.on_candles(&series(30)).unwrap().is_empty());
    }

    #[test]
    fn test_builder_rejects_zero_min_candles() {
        let cfg = NPatternConfig { min_candles: 0, ..Default::default() };
        assert!(matches!(
            MonitorBuilder::new().with_n_pattern(cfg).build(),
            Err(ReversalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_uptrend_emits_nothing() {
        let mut monitor = MonitorBuilder::new()
            .with_n_pattern(NPatternConfig::default())
            .with_trendline(TrendlineConfig::default())
            .validate_data(true)
            .build()
            .unwrap();
        let candles = series(30);

        for end in monitor.min_candles()..=candles.len() {
            assert!(monitor.on_candles(&candles[..end]).unwrap().is_empty());
        }
        assert_eq!(monitor.n_pattern().map(|a| a.state().reversal_count), Some(0));
    }

    #[test]
    fn test_validation_reports_index() {
        let mut monitor = MonitorBuilder::new().validate_data(true).build().unwrap();

        let mut bad = series(12);
        bad[7].high = bad[7].low - 1.0;
        assert!(matches!(
            monitor.on_candles(&bad),
            Err(ReversalError::InvalidCandle { index: 7, reason: "high < low" })
        ));

        let mut unordered = series(12);
        unordered.swap(3, 4);
        assert!(matches!(
            monitor.on_candles(&unordered),
            Err(ReversalError::InvalidCandle { index: 4, reason: "time not ascending" })
        ));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut monitor = MonitorBuilder::new()
            .with_n_pattern(NPatternConfig::default())
            .build()
            .unwrap();

        // Two lower highs around a lower low: a falling pattern
        let t0 = Utc.with_ymd_and_hms(2026, 2, 19, 0, 0, 0).unwrap();
        let closes = [
            100.0, 99.5, 99.0, 98.5, 98.0, 98.25, 98.5, 98.75, 99.0, 98.375, 97.75, 97.125,
            96.5, 96.75, 97.0, 97.25, 97.5, 96.875, 96.25, 95.625, 95.0,
        ];
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(t0 + Duration::minutes(5 * i as i64), c, c + 0.5, c - 0.5, c))
            .collect();

        assert!(monitor.on_candles(&candles).unwrap().is_empty());
        assert!(monitor.n_pattern().is_some_and(|a| a.state().current_pattern.is_some()));

        monitor.reset();
        let state = monitor.n_pattern().map(|a| a.state().clone());
        assert_eq!(state, Some(NPatternState::default()));
    }
}
