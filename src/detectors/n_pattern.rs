//! N-pattern classification and the pattern-change reversal check
//!
//! The last three swing points form an "N" when they alternate LOW-HIGH-LOW
//! with a higher final low (rising) or HIGH-LOW-HIGH with a lower final high
//! (falling). With five or more swing points the middle point must also
//! extend the older swing of the same kind.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::helpers::{
    percent_change, AMPLITUDE_WEIGHT, CONSISTENCY_WEIGHT, FULL_AMPLITUDE_MOVE,
    NEUTRAL_CONSISTENCY,
};
use super::swing::{Extremum, SwingPoint};
use crate::{ReversalEvent, ReversalType};

/// Swing points needed before the historical confirmation applies
pub const CONFIRMATION_MIN_SWINGS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PatternDirection {
    /// Higher lows and higher highs
    Rising,
    /// Lower highs and lower lows
    Falling,
}

/// Swing-point field compared when accepting a pattern direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    /// The high/low extreme (raw price histories)
    Extreme,
    /// The candle close at the swing
    #[default]
    Close,
}

impl PriceField {
    #[inline]
    pub fn of(self, point: &SwingPoint) -> f64 {
        match self {
            PriceField::Extreme => point.price,
            PriceField::Close => point.close_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pattern {
    pub direction: PatternDirection,
    pub swing_points: [SwingPoint; 3],
    /// Quality score 0.0..=1.0
    pub strength: f64,
    pub start_price: f64,
    pub end_price: f64,
    pub change_percent: f64,
}

impl Pattern {
    #[inline]
    pub fn last_swing(&self) -> &SwingPoint {
        &self.swing_points[2]
    }
}

/// Classify the last three swing points.
pub fn detect_n_pattern(swings: &[SwingPoint], field: PriceField) -> Option<Pattern> {
    if swings.len() < 3 {
        debug!(swings = swings.len(), "not enough swing points for an N-pattern");
        return None;
    }

    let n = swings.len();
    let [a, b, c] = [swings[n - 3], swings[n - 2], swings[n - 1]];
    let value = |p: &SwingPoint| field.of(p);

    let direction = match (a.kind, b.kind, c.kind) {
        (Extremum::Low, Extremum::High, Extremum::Low)
            if value(&c) > value(&a)
                && confirmed(swings, Extremum::High, |prev| value(&b) > value(prev)) =>
        {
            PatternDirection::Rising
        }
        (Extremum::High, Extremum::Low, Extremum::High)
            if value(&c) < value(&a)
                && confirmed(swings, Extremum::Low, |prev| value(&b) < value(prev)) =>
        {
            PatternDirection::Falling
        }
        _ => return None,
    };

    let points = [a, b, c];
    let strength = pattern_strength(&points);
    let change_percent = percent_change(a.close_price, c.close_price);

    debug!(?direction, strength, change_percent, "N-pattern detected");

    Some(Pattern {
        direction,
        swing_points: points,
        strength,
        start_price: a.close_price,
        end_price: c.close_price,
        change_percent,
    })
}

/// With enough history, the first swing of `kind` among the three before the
/// pattern's middle point must satisfy `extends`.
fn confirmed(swings: &[SwingPoint], kind: Extremum, extends: impl Fn(&SwingPoint) -> bool) -> bool {
    let n = swings.len();
    if n < CONFIRMATION_MIN_SWINGS {
        return true;
    }
    swings[n - 5..n - 2]
        .iter()
        .find(|s| s.kind == kind)
        .is_some_and(extends)
}

/// Strength of a three-point pattern in 0.0..=1.0.
///
/// 70% amplitude (a 2% end-to-end move scores 1.0) and 30% leg consistency.
pub fn pattern_strength(points: &[SwingPoint; 3]) -> f64 {
    let [a, b, c] = points;

    let amplitude = ((c.price - a.price).abs() / a.price / FULL_AMPLITUDE_MOVE).min(1.0);

    let legs = [(b.price - a.price).abs(), (c.price - b.price).abs()];
    let avg = (legs[0] + legs[1]) / 2.0;
    let consistency = if avg > 0.0 {
        1.0 - (legs[0].max(legs[1]) - legs[0].min(legs[1])) / avg
    } else {
        NEUTRAL_CONSISTENCY
    };

    (amplitude * AMPLITUDE_WEIGHT + consistency * CONSISTENCY_WEIGHT).clamp(0.0, 1.0)
}

// ============================================================
// REVERSAL CHECK
// ============================================================

/// Pattern-change reversal emitted by the N-pattern analyzer
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReversalSignal {
    pub from_pattern: PatternDirection,
    pub to_pattern: PatternDirection,
    pub reversal_type: ReversalType,
    /// Strength of the new pattern
    pub confidence: f64,
    pub trigger_price: f64,
    pub trigger_time: DateTime<Utc>,
    pub change_percent: f64,
}

impl ReversalEvent for ReversalSignal {
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

/// Compare the current pattern against the previous one.
///
/// `reversal_threshold` is fractional (0.003 = 0.3%); the pattern's change is in percent.
pub fn check_reversal(
    current: Option<&Pattern>,
    previous: Option<&Pattern>,
    reversal_threshold: f64,
    min_strength: f64,
) -> Option<ReversalSignal> {
    let (current, previous) = (current?, previous?);
    if current.direction == previous.direction {
        return None;
    }

    let min_change_percent = reversal_threshold * 100.0;
    if current.change_percent.abs() < min_change_percent {
        debug!(
            change_percent = current.change_percent,
            min_change_percent, "pattern change too small"
        );
        return None;
    }
    if current.strength < min_strength {
        debug!(strength = current.strength, min_strength, "pattern too weak");
        return None;
    }

    let reversal_type = match current.direction {
        PatternDirection::Rising => ReversalType::Bullish,
        PatternDirection::Falling => ReversalType::Bearish,
    };
    let trigger = current.last_swing();

    info!(
        ?reversal_type,
        from = ?previous.direction,
        to = ?current.direction,
        price = current.end_price,
        "N-pattern reversal"
    );

    Some(ReversalSignal {
        from_pattern: previous.direction,
        to_pattern: current.direction,
        reversal_type,
        confidence: current.strength,
        trigger_price: current.end_price,
        trigger_time: trigger.time,
        change_percent: current.change_percent,
    })
}
