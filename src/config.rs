//! Analyzer settings from TOML or the environment
//!
//! ```toml
//! [n_pattern]
//! reversal_threshold = 0.003
//! swing_window = 2
//! min_strength = 0.5
//!
//! [trendline]
//! trend_window_hours = 12
//! min_pivot_distance = 3
//! breakout_threshold = 0.001
//! min_trend_points = 2
//! ```
//!
//! Missing tables and keys keep their defaults.

use std::path::Path;

use tracing::debug;

use crate::engine::{MonitorBuilder, NPatternConfig, TrendlineConfig};
use crate::{Period, Ratio, Result, ReversalError};

pub const ENV_REVERSAL_THRESHOLD: &str = "MIN_REVERSAL_THRESHOLD";
pub const ENV_SWING_WINDOW: &str = "SWING_WINDOW_SIZE";
pub const ENV_MIN_STRENGTH: &str = "MIN_STRENGTH";
pub const ENV_TREND_WINDOW_HOURS: &str = "TREND_WINDOW_HOURS";
pub const ENV_MIN_PIVOT_DISTANCE: &str = "MIN_PIVOT_DISTANCE";
pub const ENV_BREAKOUT_THRESHOLD: &str = "BREAKOUT_THRESHOLD";
pub const ENV_MIN_TREND_POINTS: &str = "MIN_TREND_POINTS";

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    pub n_pattern: NPatternConfig,
    pub trendline: TrendlineConfig,
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(text).map_err(|e| ReversalError::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReversalError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by process environment variables (a `.env` file is loaded first)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup(key)`; absent keys keep the current value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let n = &mut self.n_pattern;
        if let Some(v) = ratio(&lookup, ENV_REVERSAL_THRESHOLD)? {
            n.reversal_threshold = v;
        }
        if let Some(v) = period(&lookup, ENV_SWING_WINDOW)? {
            n.swing_window = v;
        }
        if let Some(v) = ratio(&lookup, ENV_MIN_STRENGTH)? {
            n.min_strength = v;
        }

        let t = &mut self.trendline;
        if let Some(v) = period(&lookup, ENV_TREND_WINDOW_HOURS)? {
            t.trend_window_hours = v;
        }
        if let Some(v) = period(&lookup, ENV_MIN_PIVOT_DISTANCE)? {
            t.min_pivot_distance = v;
        }
        if let Some(v) = ratio(&lookup, ENV_BREAKOUT_THRESHOLD)? {
            t.breakout_threshold = v;
        }
        if let Some(v) = period(&lookup, ENV_MIN_TREND_POINTS)? {
            t.min_trend_points = v;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.n_pattern.validate()?;
        self.trendline.validate()
    }

    /// Builder with both analyzers enabled
    pub fn monitor(&self) -> MonitorBuilder {
        MonitorBuilder::new()
            .with_n_pattern(self.n_pattern)
            .with_trendline(self.trendline)
    }
}

fn ratio<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Result<Option<Ratio>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ReversalError::InvalidConfig(format!("{key}={raw:?} is not a number")))?;
    let ratio = Ratio::new(value)
        .map_err(|e| ReversalError::InvalidConfig(format!("{key}: {e}")))?;
    debug!(key, value, "config override");
    Ok(Some(ratio))
}

fn period<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Result<Option<Period>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value: usize = raw.trim().parse().map_err(|_| {
        ReversalError::InvalidConfig(format!("{key}={raw:?} is not a positive integer"))
    })?;
    let period = Period::new(value)
        .map_err(|e| ReversalError::InvalidConfig(format!("{key}: {e}")))?;
    debug!(key, value, "config override");
    Ok(Some(period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_toml() {
        let settings = Settings::from_toml_str(
            r#"
[n_pattern]
swing_window = 3
price_field = "extreme"

[trendline]
breakout_threshold = 0.0008
"#,
        )
        .unwrap();

        assert_eq!(settings.n_pattern.swing_window.get(), 3);
        assert_eq!(settings.n_pattern.reversal_threshold.get(), 0.003);
        assert_eq!(settings.n_pattern.price_field, crate::detectors::PriceField::Extreme);
        assert_eq!(settings.trendline.breakout_threshold.get(), 0.0008);
        assert_eq!(settings.trendline.trend_window_hours.get(), 12);
    }

    #[test]
    fn test_toml_rejects_invalid_values() {
        let err = Settings::from_toml_str("[n_pattern]\nmin_strength = 2.0\n").unwrap_err();
        assert!(matches!(err, ReversalError::InvalidConfig(_)));
        assert!(Settings::from_toml_str("[trendline]\nmin_trend_points = 0\n").is_err());
        assert!(Settings::from_toml_str("[trendline]\nmin_candles = 0\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::default()
            .with_overrides(lookup(&[
                ("MIN_REVERSAL_THRESHOLD", "0.002"),
                ("SWING_WINDOW_SIZE", " 4 "),
                ("TREND_WINDOW_HOURS", "8"),
            ]))
            .unwrap();

        assert_eq!(settings.n_pattern.reversal_threshold.get(), 0.002);
        assert_eq!(settings.n_pattern.swing_window.get(), 4);
        assert_eq!(settings.n_pattern.min_strength.get(), 0.5);
        assert_eq!(settings.trendline.trend_window_hours.get(), 8);
        assert_eq!(settings.trendline.min_pivot_distance.get(), 3);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        for (key, value) in [
            ("MIN_STRENGTH", "strong"),
            ("MIN_STRENGTH", "1.2"),
            ("MIN_PIVOT_DISTANCE", "0"),
            ("MIN_TREND_POINTS", "2.5"),
        ] {
            let result = Settings::default().with_overrides(lookup(&[(key, value)]));
            assert!(matches!(result, Err(ReversalError::InvalidConfig(_))), "{key}={value}");
        }
    }

    #[test]
    fn test_monitor_from_settings() {
        let monitor = Settings::default().monitor().build().unwrap();
        assert!(monitor.n_pattern().is_some());
        assert!(monitor.trendline().is_some());
        assert_eq!(monitor.min_candles(), 10);
    }
}
