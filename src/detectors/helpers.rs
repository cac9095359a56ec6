//! Numeric helpers shared across detector modules

/// Slope (percent of mean) above which a regression trend counts as rising
pub const TREND_SLOPE_THRESHOLD_PCT: f64 = 0.005;

/// Total swing move that earns a full amplitude score (2%)
pub const FULL_AMPLITUDE_MOVE: f64 = 0.02;

/// Amplitude weight in the N-pattern strength score
pub const AMPLITUDE_WEIGHT: f64 = 0.7;

/// Consistency weight in the N-pattern strength score
pub const CONSISTENCY_WEIGHT: f64 = 0.3;

/// Consistency used when the swing legs have zero average length
pub const NEUTRAL_CONSISTENCY: f64 = 0.5;

/// Pivot count at which a breakout reaches full confidence
pub const FULL_CONFIDENCE_PIVOTS: f64 = 5.0;

/// `|to - from| / from`
#[inline]
pub fn relative_change(from: f64, to: f64) -> f64 {
    (to - from).abs() / from
}

/// Signed `(to - from) / from * 100`
#[inline]
pub fn percent_change(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

/// Ordinary least-squares slope of `values` against their positions `0..n`.
///
/// Returns `None` for fewer than two values (zero denominator).
pub fn ols_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values)?;

    let (numerator, denominator) =
        values
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (i, &y)| {
                let dx = i as f64 - x_mean;
                (num + dx * (y - y_mean), den + dx * dx)
            });

    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator)
}

#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Weighted mean with linear weights `1, 2, ..., n` (later values weigh more)
pub fn linear_weighted_mean(values: &[f64]) -> Option<f64> {
    let (weighted_sum, total_weight) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, total), (k, &v)| {
            let weight = (k + 1) as f64;
            (sum + v * weight, total + weight)
        });

    if total_weight == 0.0 {
        return None;
    }
    Some(weighted_sum / total_weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ols_slope_line() {
        let values: Vec<f64> = (0..10).map(|i| 100.0 + 2.0 * i as f64).collect();
        assert!((ols_slope(&values).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_ols_slope_flat_and_short() {
        assert_eq!(ols_slope(&[5.0, 5.0, 5.0]), Some(0.0));
        assert_eq!(ols_slope(&[5.0]), None);
        assert_eq!(ols_slope(&[]), None);
    }

    #[test]
    fn test_linear_weighted_mean() {
        // (1*10 + 2*20 + 3*30) / 6
        let avg = linear_weighted_mean(&[10.0, 20.0, 30.0]).unwrap();
        assert!((avg - 140.0 / 6.0).abs() < 1e-12);
        assert_eq!(linear_weighted_mean(&[]), None);
    }

    #[test]
    fn test_changes() {
        assert!((relative_change(100.0, 99.0) - 0.01).abs() < 1e-12);
        assert!((percent_change(100.0, 99.0) + 1.0).abs() < 1e-12);
    }
}
