//! Pivot extraction for trendline fitting

use chrono::{DateTime, Utc};

use super::swing::Extremum;
use crate::OHLCV;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub price: f64,
    pub time: DateTime<Utc>,
}

/// Local extrema on one side of the candles, strict over `distance` candles left and right.
///
/// Empty when the window holds fewer than `2 * distance + 1` candles.
pub fn find_pivots<T: OHLCV>(candles: &[T], side: Extremum, distance: usize) -> Vec<Pivot> {
    let len = candles.len();
    if len < 2 * distance + 1 {
        return Vec::new();
    }

    let value = |c: &T| match side {
        Extremum::High => c.high(),
        Extremum::Low => c.low(),
    };
    let beats = |candidate: f64, other: f64| match side {
        Extremum::High => candidate > other,
        Extremum::Low => candidate < other,
    };

    (distance..len - distance)
        .filter_map(|i| {
            let candidate = value(&candles[i]);
            let left = &candles[i - distance..i];
            let right = &candles[i + 1..=i + distance];
            let is_pivot = left.iter().chain(right).all(|c| beats(candidate, value(c)));
            is_pivot.then(|| Pivot {
                index: i,
                price: candidate,
                time: candles[i].time(),
            })
        })
        .collect()
}
