//! Weighted trendline fitting and breakout checks

use super::helpers::linear_weighted_mean;
use super::pivot::Pivot;
use super::trend::Trend;

/// Trendline value at `current_index`.
///
/// Extrapolates the line through the first and last pivot when their indices
/// differ; otherwise falls back to the linearly weighted mean of pivot prices
/// (later pivots weigh more). `None` with fewer than `min_points` pivots.
pub fn weighted_trendline(pivots: &[Pivot], current_index: usize, min_points: usize) -> Option<f64> {
    if pivots.is_empty() || pivots.len() < min_points {
        return None;
    }

    if let [first, .., last] = pivots {
        if last.index > first.index {
            let slope = (last.price - first.price) / (last.index - first.index) as f64;
            let offset = current_index as f64 - last.index as f64;
            return Some(last.price + slope * offset);
        }
    }

    let prices: Vec<f64> = pivots.iter().map(|p| p.price).collect();
    linear_weighted_mean(&prices)
}

/// Whether `price` closes beyond `trendline` against `trend` by more than `threshold`.
#[inline]
pub fn check_breakout(price: f64, trendline: f64, trend: Trend, threshold: f64) -> bool {
    match trend {
        Trend::Falling => price > trendline * (1.0 + threshold),
        Trend::Rising => price < trendline * (1.0 - threshold),
        Trend::Neutral => false,
    }
}
