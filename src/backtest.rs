//! Replay backtesting and parameter grid search
//!
//! Analyzers are path dependent (pattern history, cooldown), so a backtest
//! replays growing prefixes of the series exactly as live candles would
//! arrive, then scores the emitted events against labeled reversals.
//! Without labels, [`analyze_results`] ranks a grid by how many reversals
//! each combination emits and how strong they are.
//!
//! # Example
//!
//! ```rust
//! use turnpoint::prelude::*;
//!
//! let candles: Vec<Candle> = vec![];
//! let labels: Vec<LabeledReversal> = vec![];
//! let backtester = Backtester::new(&candles, &labels, BacktestConfig::n_pattern());
//!
//! let results = backtester.grid_search_n_pattern(&NPatternGrid::default()).unwrap();
//! for result in turnpoint::backtest::top_n(results, 5) {
//!     println!("{:?}: score {:.1}", result.params, result.score);
//! }
//! ```

use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::engine::{NPatternAnalyzer, NPatternConfig, TrendlineConfig, TrendlineEngine};
use crate::params::ParameterizedAnalyzer;
use crate::{
    Period, Ratio, Result, ReversalAnalyzer, ReversalError, ReversalEvent, ReversalType, OHLCV,
};

// ============================================================
// LABELS
// ============================================================

/// Expected direction of a labeled reversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelDirection {
    Up,
    Down,
}

impl LabelDirection {
    #[inline]
    pub fn matches(self, reversal: ReversalType) -> bool {
        matches!(
            (self, reversal),
            (LabelDirection::Up, ReversalType::Bullish) | (LabelDirection::Down, ReversalType::Bearish)
        )
    }
}

const UP_WORDS: &[&str] = &["up", "upward", "upwards", "rise", "rises", "rising", "bull", "bullish"];
const DOWN_WORDS: &[&str] = &[
    "down", "downward", "downwards", "fall", "falls", "falling", "bear", "bearish",
];
const UP_CJK: &[&str] = &["上升", "涨"];
const DOWN_CJK: &[&str] = &["下降", "跌"];

impl FromStr for LabelDirection {
    type Err = ReversalError;

    /// Loose match: "up", "Rising", "bullish", "上升", "看涨" are all `Up`.
    ///
    /// ASCII vocabulary must appear as a whole word ("upper" is rejected),
    /// CJK terms anywhere in the text.
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim().to_lowercase();
        let has_word = |vocab: &[&str], cjk: &[&str]| {
            text.split(|c: char| !c.is_ascii_alphanumeric())
                .any(|word| vocab.iter().any(|w| *w == word))
                || cjk.iter().any(|w| text.contains(w))
        };
        match (has_word(UP_WORDS, UP_CJK), has_word(DOWN_WORDS, DOWN_CJK)) {
            (true, false) => Ok(LabelDirection::Up),
            (false, true) => Ok(LabelDirection::Down),
            _ => Err(ReversalError::InvalidLabel(s.to_string())),
        }
    }
}

/// Ground-truth reversal point
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LabeledReversal {
    pub time: DateTime<Utc>,
    pub direction: LabelDirection,
}

impl LabeledReversal {
    pub fn new(time: DateTime<Utc>, direction: LabelDirection) -> Self {
        Self { time, direction }
    }

    /// Label from free-form direction text
    pub fn parse(time: DateTime<Utc>, direction: &str) -> Result<Self> {
        Ok(Self::new(time, direction.parse()?))
    }
}

// ============================================================
// SCORING
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BacktestConfig {
    /// Max distance between a label and a matching event
    pub tolerance_minutes: i64,
    /// Score deducted per unmatched event
    pub false_positive_penalty: f64,
    /// First prefix length replayed; the analyzer's `min_candles` when unset
    pub warmup: Option<usize>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self::n_pattern()
    }
}

impl BacktestConfig {
    pub const fn n_pattern() -> Self {
        Self {
            tolerance_minutes: 30,
            false_positive_penalty: 5.0,
            warmup: None,
        }
    }

    pub const fn trendline() -> Self {
        Self {
            tolerance_minutes: 60,
            false_positive_penalty: 3.0,
            warmup: None,
        }
    }
}

/// Label/event agreement of one event stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub matches: usize,
    pub false_positives: usize,
    pub match_rate: f64,
    pub score: f64,
}

/// Score `events` against `labels`.
///
/// A label matches when the nearest same-direction event lies within the
/// tolerance. With no labels the score is `-false_positives * penalty`.
pub fn score_events<E: ReversalEvent>(
    events: &[E],
    labels: &[LabeledReversal],
    config: &BacktestConfig,
) -> Score {
    let tolerance = Duration::minutes(config.tolerance_minutes);

    let matches = labels
        .iter()
        .filter(|label| {
            events
                .iter()
                .filter(|e| label.direction.matches(e.reversal_type()))
                .map(|e| (e.trigger_time() - label.time).abs())
                .min()
                .is_some_and(|gap| gap <= tolerance)
        })
        .count();

    let false_positives = events.len().saturating_sub(matches);
    let penalty = false_positives as f64 * config.false_positive_penalty;
    let match_rate = if labels.is_empty() {
        0.0
    } else {
        matches as f64 / labels.len() as f64
    };

    Score {
        matches,
        false_positives,
        match_rate,
        score: match_rate * 100.0 - penalty,
    }
}

/// Feed growing prefixes `candles[..warmup]`, `candles[..warmup + 1]`, ... to `analyzer`.
pub fn replay<A, T>(analyzer: &mut A, candles: &[T], warmup: usize) -> Vec<A::Event>
where
    A: ReversalAnalyzer,
    T: OHLCV,
{
    (warmup.max(1)..=candles.len())
        .filter_map(|end| analyzer.analyze(&candles[..end]))
        .collect()
}

/// Keep events at least `minutes` after the last kept one
pub fn apply_cooldown<E: ReversalEvent>(events: Vec<E>, minutes: i64) -> Vec<E> {
    let spacing = Duration::minutes(minutes);
    let mut last: Option<DateTime<Utc>> = None;
    events
        .into_iter()
        .filter(|e| {
            let t = e.trigger_time();
            let keep = last.map_or(true, |prev| t - prev >= spacing);
            if keep {
                last = Some(t);
            }
            keep
        })
        .collect()
}

// ============================================================
// RESULTS
// ============================================================

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BacktestResult<P> {
    pub params: P,
    pub events_emitted: usize,
    pub matches: usize,
    pub false_positives: usize,
    pub match_rate: f64,
    pub score: f64,
    pub min_confidence: Option<f64>,
    pub avg_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
    /// Swing points in the full series (N-pattern runs only)
    pub swing_points: Option<usize>,
}

impl<P> BacktestResult<P> {
    fn from_events<E: ReversalEvent>(params: P, events: &[E], score: Score) -> Self {
        let confidences: Vec<f64> = events.iter().map(|e| e.confidence()).collect();
        let (min, max) = confidences
            .iter()
            .fold(None, |acc: Option<(f64, f64)>, &c| match acc {
                None => Some((c, c)),
                Some((lo, hi)) => Some((lo.min(c), hi.max(c))),
            })
            .unzip();

        Self {
            params,
            events_emitted: events.len(),
            matches: score.matches,
            false_positives: score.false_positives,
            match_rate: score.match_rate,
            score: score.score,
            min_confidence: min,
            avg_confidence: crate::detectors::mean(&confidences),
            max_confidence: max,
            swing_points: None,
        }
    }

    /// Mean event confidence, 0.0 without events. For N-pattern runs this
    /// is the average strength of the reversing patterns.
    #[inline]
    pub fn avg_strength(&self) -> f64 {
        self.avg_confidence.unwrap_or(0.0)
    }
}

/// Trendline configuration plus the post-filter spacing used in backtests
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendlineParams {
    pub config: TrendlineConfig,
    pub cooldown_minutes: i64,
}

// ============================================================
// GRIDS
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NPatternGrid {
    pub reversal_thresholds: Vec<f64>,
    pub swing_windows: Vec<usize>,
    pub min_strengths: Vec<f64>,
}

impl Default for NPatternGrid {
    fn default() -> Self {
        Self {
            reversal_thresholds: vec![0.0005, 0.001, 0.002, 0.003, 0.005],
            swing_windows: vec![2, 3, 4, 5],
            min_strengths: vec![0.2, 0.3, 0.4, 0.5],
        }
    }
}

impl NPatternGrid {
    /// Grid spanning each parameter's metadata search range
    pub fn from_param_meta() -> Self {
        let mut grid = Self {
            reversal_thresholds: Vec::new(),
            swing_windows: Vec::new(),
            min_strengths: Vec::new(),
        };
        for meta in NPatternConfig::param_meta() {
            let values = meta.generate_grid();
            match meta.name {
                "reversal_threshold" => grid.reversal_thresholds = values,
                "swing_window" => grid.swing_windows = values.iter().map(|v| *v as usize).collect(),
                "min_strength" => grid.min_strengths = values,
                _ => {},
            }
        }
        grid
    }

    pub fn len(&self) -> usize {
        self.reversal_thresholds.len() * self.swing_windows.len() * self.min_strengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, in threshold/window/strength order
    pub fn combinations(&self) -> Result<Vec<NPatternConfig>> {
        let mut configs = Vec::with_capacity(self.len());
        for &threshold in &self.reversal_thresholds {
            for &window in &self.swing_windows {
                for &strength in &self.min_strengths {
                    configs.push(NPatternConfig {
                        reversal_threshold: Ratio::new(threshold)?,
                        swing_window: Period::new(window)?,
                        min_strength: Ratio::new(strength)?,
                        ..NPatternConfig::default()
                    });
                }
            }
        }
        Ok(configs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendlineGrid {
    pub window_hours: Vec<usize>,
    pub pivot_distances: Vec<usize>,
    pub breakout_thresholds: Vec<f64>,
    pub min_trend_points: Vec<usize>,
    pub cooldown_minutes: Vec<i64>,
}

impl Default for TrendlineGrid {
    fn default() -> Self {
        Self {
            window_hours: vec![6, 8, 10, 12],
            pivot_distances: vec![2, 3],
            breakout_thresholds: vec![0.0005, 0.0008, 0.001],
            min_trend_points: vec![2],
            cooldown_minutes: vec![20, 30, 40],
        }
    }
}

impl TrendlineGrid {
    /// Grid spanning each parameter's metadata search range.
    ///
    /// Cooldowns are a backtest-only filter without metadata and keep their defaults.
    pub fn from_param_meta() -> Self {
        let mut grid = Self::default();
        for meta in TrendlineConfig::param_meta() {
            let values = meta.generate_grid();
            let periods = || -> Vec<usize> { values.iter().map(|v| *v as usize).collect() };
            match meta.name {
                "trend_window_hours" => grid.window_hours = periods(),
                "min_pivot_distance" => grid.pivot_distances = periods(),
                "breakout_threshold" => grid.breakout_thresholds = values.clone(),
                "min_trend_points" => grid.min_trend_points = periods(),
                _ => {},
            }
        }
        grid
    }

    pub fn len(&self) -> usize {
        self.window_hours.len()
            * self.pivot_distances.len()
            * self.breakout_thresholds.len()
            * self.min_trend_points.len()
            * self.cooldown_minutes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, in hours/distance/threshold/points/cooldown order
    pub fn combinations(&self) -> Result<Vec<TrendlineParams>> {
        if let Some(cooldown) = self.cooldown_minutes.iter().find(|&&m| m < 0) {
            return Err(ReversalError::InvalidConfig(format!(
                "cooldown_minutes must be >= 0, got {cooldown}"
            )));
        }

        let mut params = Vec::with_capacity(self.len());
        for &hours in &self.window_hours {
            for &distance in &self.pivot_distances {
                for &threshold in &self.breakout_thresholds {
                    for &points in &self.min_trend_points {
                        let config = TrendlineConfig {
                            trend_window_hours: Period::new(hours)?,
                            min_pivot_distance: Period::new(distance)?,
                            breakout_threshold: Ratio::new(threshold)?,
                            min_trend_points: Period::new(points)?,
                            ..TrendlineConfig::default()
                        };
                        params.extend(self.cooldown_minutes.iter().map(|&cooldown_minutes| {
                            TrendlineParams {
                                config,
                                cooldown_minutes,
                            }
                        }));
                    }
                }
            }
        }
        Ok(params)
    }
}

// ============================================================
// BACKTESTER
// ============================================================

/// Replays one candle series against a fixed label set.
///
/// Each run builds a fresh analyzer, so grid combinations are independent
/// and evaluated in parallel.
pub struct Backtester<'a, T> {
    candles: &'a [T],
    labels: &'a [LabeledReversal],
    config: BacktestConfig,
}

impl<'a, T: OHLCV + Sync> Backtester<'a, T> {
    pub fn new(candles: &'a [T], labels: &'a [LabeledReversal], config: BacktestConfig) -> Self {
        Self { candles, labels, config }
    }

    #[inline]
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    fn warmup<A: ReversalAnalyzer>(&self, analyzer: &A) -> usize {
        self.config.warmup.unwrap_or_else(|| analyzer.min_candles())
    }

    pub fn run_n_pattern(&self, config: NPatternConfig) -> BacktestResult<NPatternConfig> {
        let mut analyzer = NPatternAnalyzer::new(config);
        let warmup = self.warmup(&analyzer);
        let events = replay(&mut analyzer, self.candles, warmup);
        let score = score_events(&events, self.labels, &self.config);
        let swing_points = analyzer.state().swing_point_history.len();
        debug!(
            ?config,
            events = events.len(),
            swing_points,
            score = score.score,
            "n_pattern run"
        );
        BacktestResult {
            swing_points: Some(swing_points),
            ..BacktestResult::from_events(config, &events, score)
        }
    }

    pub fn run_trendline(&self, params: TrendlineParams) -> BacktestResult<TrendlineParams> {
        let mut engine = TrendlineEngine::new(params.config);
        let warmup = self.warmup(&engine);
        let events = apply_cooldown(
            replay(&mut engine, self.candles, warmup),
            params.cooldown_minutes,
        );
        let score = score_events(&events, self.labels, &self.config);
        debug!(?params, events = events.len(), score = score.score, "trendline run");
        BacktestResult::from_events(params, &events, score)
    }

    /// Results for every combination, best score first
    pub fn grid_search_n_pattern(
        &self,
        grid: &NPatternGrid,
    ) -> Result<Vec<BacktestResult<NPatternConfig>>> {
        let combos = grid.combinations()?;
        info!(combinations = combos.len(), "n_pattern grid search");
        let results = combos.into_par_iter().map(|cfg| self.run_n_pattern(cfg)).collect();
        Ok(Self::ranked(results))
    }

    /// Results for every combination, best score first
    pub fn grid_search_trendline(
        &self,
        grid: &TrendlineGrid,
    ) -> Result<Vec<BacktestResult<TrendlineParams>>> {
        let combos = grid.combinations()?;
        info!(combinations = combos.len(), "trendline grid search");
        let results = combos.into_par_iter().map(|p| self.run_trendline(p)).collect();
        Ok(Self::ranked(results))
    }

    fn ranked<P>(mut results: Vec<BacktestResult<P>>) -> Vec<BacktestResult<P>> {
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        if let Some(best) = results.first() {
            info!(score = best.score, matches = best.matches, "best combination");
        }
        results
    }
}

/// Keep the `n` best of already ranked results
pub fn top_n<P>(mut results: Vec<BacktestResult<P>>, n: usize) -> Vec<BacktestResult<P>> {
    results.truncate(n);
    results
}

// ============================================================
// UNLABELED REPORT
// ============================================================

/// Reversal counts in this band are considered well calibrated
pub const IDEAL_REVERSALS: RangeInclusive<usize> = 3..=8;

const COUNT_WEIGHT: f64 = 0.4;
const STRENGTH_WEIGHT: f64 = 0.6;

/// Sensitivity score of a reversal count in 0.0..=1.0.
///
/// Full marks inside [`IDEAL_REVERSALS`], linear ramp up to it, and a 0.1
/// deduction per reversal above it.
pub fn count_score(reversals: usize) -> f64 {
    let (low, high) = (*IDEAL_REVERSALS.start(), *IDEAL_REVERSALS.end());
    if reversals < low {
        reversals as f64 / low as f64
    } else if reversals <= high {
        1.0
    } else {
        (1.0 - (reversals - high) as f64 * 0.1).max(0.0)
    }
}

/// Label-free score: 40% count calibration, 60% average strength
pub fn unlabeled_score<P>(result: &BacktestResult<P>) -> f64 {
    count_score(result.events_emitted) * COUNT_WEIGHT + result.avg_strength() * STRENGTH_WEIGHT
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Spread {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl Spread {
    fn of(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut n = 0usize;
        let mut spread = Spread {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            avg: 0.0,
        };
        for v in values {
            spread.min = spread.min.min(v);
            spread.max = spread.max.max(v);
            spread.avg += v;
            n += 1;
        }
        (n > 0).then(|| Spread { avg: spread.avg / n as f64, ..spread })
    }
}

/// Summary of a grid run without labels
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct GridReport<P> {
    pub total: usize,
    pub reversal_count: Spread,
    pub avg_strength: Spread,
    /// Highest [`unlabeled_score`]
    pub best_by_score: BacktestResult<P>,
    pub best_by_strength: BacktestResult<P>,
    /// Most reversals emitted
    pub most_sensitive: BacktestResult<P>,
    /// Fewest reversals emitted
    pub least_sensitive: BacktestResult<P>,
}

/// Summarize grid results for tuning without labels.
///
/// Ties go to the earliest result, except `most_sensitive` which takes the
/// latest. Returns `None` for an empty slice.
pub fn analyze_results<P: Clone>(results: &[BacktestResult<P>]) -> Option<GridReport<P>> {
    let reversal_count = Spread::of(results.iter().map(|r| r.events_emitted as f64))?;
    let avg_strength = Spread::of(results.iter().map(BacktestResult::avg_strength))?;

    // `max_by` keeps the last maximum, so scan in reverse for the first one
    let best_by_score = results
        .iter()
        .rev()
        .max_by(|a, b| unlabeled_score(*a).total_cmp(&unlabeled_score(*b)))?;
    let best_by_strength = results
        .iter()
        .rev()
        .max_by(|a, b| a.avg_strength().total_cmp(&b.avg_strength()))?;
    let most_sensitive = results.iter().max_by_key(|r| r.events_emitted)?;
    let least_sensitive = results.iter().min_by_key(|r| r.events_emitted)?;

    info!(
        total = results.len(),
        best_score = unlabeled_score(best_by_score),
        best_reversals = best_by_score.events_emitted,
        "unlabeled grid report"
    );

    Some(GridReport {
        total: results.len(),
        reversal_count,
        avg_strength,
        best_by_score: best_by_score.clone(),
        best_by_strength: best_by_strength.clone(),
        most_sensitive: most_sensitive.clone(),
        least_sensitive: least_sensitive.clone(),
    })
}
