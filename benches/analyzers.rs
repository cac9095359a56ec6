//! Benchmarks for reversal detection and backtesting.

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use turnpoint::backtest::replay;
use turnpoint::prelude::*;

fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 2, 19, 0, 0, 0).unwrap()
}

/// Generate 5-minute candles with deterministic "random" moves
fn generate_candles(n: usize) -> Vec<Candle> {
  let mut candles = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 100.0 - 0.5; // Deterministic "random"
    let volatility = 0.2 + ((i * 3) % 10) as f64 / 20.0;

    let o = price;
    let c = price + change;
    let h = o.max(c) + volatility * 0.5;
    let l = o.min(c) - volatility * 0.5;

    candles.push(Candle::new(t0() + Duration::minutes(5 * i as i64), o, h, l, c));
    price = c;
  }

  candles
}

fn bench_swing_points(c: &mut Criterion) {
  let candles = generate_candles(1000);

  c.bench_function("swing_points_1000_candles", |b| {
    b.iter(|| {
      let _ = black_box(find_swing_points(black_box(&candles), 2, 0.003));
    })
  });
}

fn bench_single_step(c: &mut Criterion) {
  let candles = generate_candles(288);

  c.bench_function("n_pattern_step_288_candles", |b| {
    let mut analyzer = NPatternAnalyzer::default();
    b.iter(|| {
      let _ = black_box(analyzer.analyze(black_box(&candles)));
    })
  });

  c.bench_function("trendline_step_288_candles", |b| {
    let mut engine = TrendlineEngine::default();
    b.iter(|| {
      let _ = black_box(engine.analyze(black_box(&candles)));
    })
  });
}

fn bench_replay_scaling(c: &mut Criterion) {
  let mut group = c.benchmark_group("replay");

  for size in [100, 300, 600].iter() {
    let candles = generate_candles(*size);

    group.bench_with_input(BenchmarkId::new("n_pattern", size), size, |b, _| {
      b.iter(|| {
        let mut analyzer = NPatternAnalyzer::default();
        let _ = black_box(replay(&mut analyzer, black_box(&candles), 10));
      })
    });

    group.bench_with_input(BenchmarkId::new("trendline", size), size, |b, _| {
      b.iter(|| {
        let mut engine = TrendlineEngine::default();
        let _ = black_box(replay(&mut engine, black_box(&candles), 10));
      })
    });
  }

  group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
  let candles = generate_candles(300);
  let labels = vec![
    LabeledReversal::new(t0() + Duration::hours(4), LabelDirection::Up),
    LabeledReversal::new(t0() + Duration::hours(12), LabelDirection::Down),
  ];
  let backtester = Backtester::new(&candles, &labels, BacktestConfig::n_pattern());
  let grid = NPatternGrid::default();

  let mut group = c.benchmark_group("grid_search");
  group.sample_size(10);
  group.bench_function("n_pattern_80_combinations_300_candles", |b| {
    b.iter(|| {
      let _ = black_box(backtester.grid_search_n_pattern(black_box(&grid)));
    })
  });
  group.finish();
}

criterion_group!(
  benches,
  bench_swing_points,
  bench_single_step,
  bench_replay_scaling,
  bench_grid_search,
);

criterion_main!(benches);
