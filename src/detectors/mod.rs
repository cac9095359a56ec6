//! Stateless reversal detectors
//!
//! Every function here is a pure derivation from a candle slice (or from
//! values derived from one). Cross-call state lives in [`crate::engine`].
//!
//! # Stages
//!
//! - **Swing points**: amplitude-filtered local highs/lows
//! - **N-patterns**: LOW-HIGH-LOW / HIGH-LOW-HIGH motifs and the reversal check
//! - **Trend**: regression slope classification
//! - **Pivots / trendlines**: trend-side extrema, fitted line, breakout test

pub mod helpers;

pub mod n_pattern;
pub mod pivot;
pub mod swing;
pub mod trend;
pub mod trendline;

// Re-export all detectors for convenience
pub use helpers::*;
pub use n_pattern::*;
pub use pivot::*;
pub use swing::*;
pub use trend::*;
pub use trendline::*;
