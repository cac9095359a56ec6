//! Swing-point extraction
//!
//! A swing point is a candle whose high (or low) is a strict extremum of the
//! `window` candles on either side. Candidates closer than `min_threshold` to
//! the last *accepted* swing point are merged into the move and dropped.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::helpers::relative_change;
use crate::OHLCV;

/// Fewer candles than this never yield swing points
pub const MIN_SWING_CANDLES: usize = 5;

/// Which side of the candle an extremum sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Extremum {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SwingPoint {
    /// Position in the source series
    pub index: usize,
    /// Extremal price: the candle's high for `High`, low for `Low`
    pub price: f64,
    pub close_price: f64,
    pub time: DateTime<Utc>,
    pub kind: Extremum,
}

/// Extract amplitude-filtered swing points, ordered by index.
///
/// Returns an empty vector for series shorter than [`MIN_SWING_CANDLES`].
pub fn find_swing_points<T: OHLCV>(
    candles: &[T],
    window: usize,
    min_threshold: f64,
) -> Vec<SwingPoint> {
    let len = candles.len();
    if len < MIN_SWING_CANDLES || len <= window * 2 {
        debug!(candles = len, window, "not enough candles for swing points");
        return Vec::new();
    }

    let mut swings: Vec<SwingPoint> = Vec::new();

    for i in window..len - window {
        let candle = &candles[i];
        let neighbours = (i - window..=i + window).filter(|&j| j != i);

        let high = candle.high();
        let low = candle.low();
        let mut is_high = true;
        let mut is_low = true;
        for j in neighbours {
            is_high &= high > candles[j].high();
            is_low &= low < candles[j].low();
            if !is_high && !is_low {
                break;
            }
        }

        let (kind, price) = if is_high {
            (Extremum::High, high)
        } else if is_low {
            (Extremum::Low, low)
        } else {
            continue;
        };

        if let Some(last) = swings.last() {
            if relative_change(last.price, price) < min_threshold {
                continue;
            }
        }

        swings.push(SwingPoint {
            index: i,
            price,
            close_price: candle.close(),
            time: candle.time(),
            kind,
        });
    }

    debug!(count = swings.len(), "swing points identified");
    swings
}
