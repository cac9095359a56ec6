//! Integration tests for replay backtesting and grid search.

use chrono::{DateTime, Duration, TimeZone, Utc};
use turnpoint::backtest::{analyze_results, replay, score_events, top_n, unlabeled_score};
use turnpoint::prelude::*;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 19, 0, 0, 0).unwrap()
}

fn at(h: i64, m: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(60 * h + m)
}

fn series(waypoints: &[f64]) -> Vec<Candle> {
    let mut closes: Vec<f64> = waypoints
        .windows(2)
        .flat_map(|leg| (0..4).map(move |k| leg[0] + (leg[1] - leg[0]) * k as f64 / 4.0))
        .collect();
    closes.extend(waypoints.last());
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle::new(t0() + Duration::minutes(5 * i as i64), c, c + 0.5, c - 0.5, c))
        .collect()
}

fn v_shape() -> Vec<Candle> {
    series(&[
        100.0, 98.0, 99.0, 96.5, 97.5, 95.0, 96.0, 93.5, 95.5, 94.5, 97.0, 96.0, 98.5, 97.5, 100.0,
    ])
}

fn stairs() -> Vec<Candle> {
    series(&[
        100.0, 98.0, 99.0, 97.0, 98.0, 96.0, 97.0, 95.0, 96.0, 94.0, 98.0, 97.0, 101.0, 100.0,
        102.0,
    ])
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_n_pattern_run_matches_label() {
    init_tracing();
    let candles = v_shape();
    let labels = [LabeledReversal::parse(at(3, 40), "上升").unwrap()];
    let backtester = Backtester::new(&candles, &labels, BacktestConfig::n_pattern());

    let result = backtester.run_n_pattern(NPatternConfig::default());
    assert_eq!(result.events_emitted, 1);
    assert_eq!(result.matches, 1);
    assert_eq!(result.false_positives, 0);
    assert_eq!(result.match_rate, 1.0);
    assert_eq!(result.score, 100.0);
    assert_eq!(result.min_confidence, result.max_confidence);
    assert_eq!(result.swing_points, Some(13));
}

#[test]
fn test_wrong_direction_label_is_false_positive() {
    let candles = v_shape();
    let labels = [LabeledReversal::new(at(3, 40), LabelDirection::Down)];
    let backtester = Backtester::new(&candles, &labels, BacktestConfig::n_pattern());

    let result = backtester.run_n_pattern(NPatternConfig::default());
    assert_eq!(result.matches, 0);
    assert_eq!(result.false_positives, 1);
    assert_eq!(result.score, -5.0);
}

#[test]
fn test_trendline_run_with_cooldown() {
    let candles = stairs();
    let labels = [
        LabeledReversal::new(at(3, 0), LabelDirection::Up),
        LabeledReversal::new(at(5, 0), LabelDirection::Down),
    ];
    let backtester = Backtester::new(&candles, &labels, BacktestConfig::trendline());

    let result = backtester.run_trendline(TrendlineParams {
        config: TrendlineConfig::default(),
        cooldown_minutes: 30,
    });

    // Kept: 03:10 and 03:50
    assert_eq!(result.events_emitted, 2);
    assert_eq!(result.matches, 1);
    assert_eq!(result.false_positives, 1);
    assert_eq!(result.score, 47.0);
    assert!((result.min_confidence.unwrap() - 0.8).abs() < 1e-12);
    assert_eq!(result.max_confidence, Some(1.0));
    assert!((result.avg_confidence.unwrap() - 0.9).abs() < 1e-12);
    assert_eq!(result.swing_points, None);
}

#[test]
fn test_empty_labels_score_is_penalty_only() {
    let candles = stairs();
    let backtester = Backtester::new(&candles, &[], BacktestConfig::trendline());

    let result = backtester.run_trendline(TrendlineParams {
        config: TrendlineConfig::default(),
        cooldown_minutes: 0,
    });
    assert_eq!(result.events_emitted, 10);
    assert_eq!(result.match_rate, 0.0);
    assert_eq!(result.score, -30.0);
}

#[test]
fn test_warmup_override() {
    let candles = stairs();
    let config = BacktestConfig {
        warmup: Some(45),
        ..BacktestConfig::trendline()
    };
    let backtester = Backtester::new(&candles, &[], config);

    // First replayed prefix ends at 03:40
    let result = backtester.run_trendline(TrendlineParams {
        config: TrendlineConfig::default(),
        cooldown_minutes: 0,
    });
    assert_eq!(result.events_emitted, 5);
}

#[test]
fn test_replay_matches_manual_loop() {
    let candles = v_shape();
    let mut replayed = NPatternAnalyzer::default();
    let events = replay(&mut replayed, &candles, 10);

    let mut manual = NPatternAnalyzer::default();
    let mut expected = Vec::new();
    for end in 10..=candles.len() {
        expected.extend(manual.analyze(&candles[..end]));
    }
    assert_eq!(events, expected);
    assert_eq!(replayed.state(), manual.state());

    let score = score_events(&events, &[], &BacktestConfig::n_pattern());
    assert_eq!(score.score, -5.0);
}

#[test]
fn test_n_pattern_grid_search_is_ranked_and_deterministic() {
    init_tracing();
    let candles = v_shape();
    let labels = vec![LabeledReversal::new(at(3, 40), LabelDirection::Up)];
    let snapshot = labels.clone();
    let backtester = Backtester::new(&candles, &labels, BacktestConfig::n_pattern());
    let grid = NPatternGrid::default();

    let first = backtester.grid_search_n_pattern(&grid).unwrap();
    let second = backtester.grid_search_n_pattern(&grid).unwrap();

    assert_eq!(first.len(), 80);
    assert_eq!(first, second);
    assert!(first.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(labels, snapshot);

    let best = first[0].clone();
    assert_eq!(best.matches, 1);
    assert!(best.score <= 100.0);

    let top = top_n(first, 5);
    assert_eq!(top.len(), 5);
    assert_eq!(top[0], best);
}

#[test]
fn test_trendline_grid_search() {
    let candles = stairs();
    let labels = [LabeledReversal::new(at(3, 0), LabelDirection::Up)];
    let backtester = Backtester::new(&candles, &labels, BacktestConfig::trendline());
    let grid = TrendlineGrid {
        window_hours: vec![12],
        pivot_distances: vec![3],
        breakout_thresholds: vec![0.001],
        min_trend_points: vec![2],
        cooldown_minutes: vec![0, 30, 60],
    };

    let results = backtester.grid_search_trendline(&grid).unwrap();
    let ranked: Vec<_> = results
        .iter()
        .map(|r| (r.params.cooldown_minutes, r.events_emitted, r.score))
        .collect();

    // One match each; ties keep grid order
    assert_eq!(ranked, vec![(30, 2, 97.0), (60, 2, 97.0), (0, 10, 73.0)]);
}

#[test]
fn test_unlabeled_grid_report() {
    let candles = v_shape();
    let backtester = Backtester::new(&candles, &[], BacktestConfig::n_pattern());
    let grid = NPatternGrid::default();
    let results = backtester.grid_search_n_pattern(&grid).unwrap();

    // Every combination catches the single bullish turn, so ties keep grid order
    let report = analyze_results(&results).unwrap();
    assert_eq!(report.total, 80);
    assert_eq!(report.reversal_count.min, 1.0);
    assert_eq!(report.reversal_count.max, 1.0);
    assert!((report.avg_strength.max - 0.6948742746615085).abs() < 1e-12);

    let combos = grid.combinations().unwrap();
    assert_eq!(report.best_by_score.params, combos[0]);
    assert_eq!(report.best_by_strength.params, combos[0]);
    assert_eq!(report.least_sensitive.params, combos[0]);
    assert_eq!(report.most_sensitive.params, combos[79]);
    assert_eq!(report.least_sensitive.swing_points, Some(13));
    assert_eq!(report.most_sensitive.swing_points, Some(11));

    let expected = 0.4 / 3.0 + 0.6948742746615085 * 0.6;
    assert!((unlabeled_score(&report.best_by_score) - expected).abs() < 1e-12);
}
