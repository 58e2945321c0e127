//! Market Regime Types
//!
//! Regime labels and the normalized score triple produced by the classifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance used when checking that normalized scores sum to one
pub const SCORE_SUM_EPSILON: f64 = 1e-6;

/// Market regime classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketRegime {
    /// Directional market, pullback entries favored
    Trend,
    /// Sideways market, fades at range extremes favored
    Range,
    /// Expanding volatility, breakout entries favored
    Volatile,
    /// Not enough evidence to classify
    Unknown,
}

impl MarketRegime {
    /// Upper-case label used in tags and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::Trend => "TREND",
            MarketRegime::Range => "RANGE",
            MarketRegime::Volatile => "VOLATILE",
            MarketRegime::Unknown => "UNKNOWN",
        }
    }

    /// Strategy routed to this regime, if any
    pub fn strategy_name(&self) -> Option<&'static str> {
        match self {
            MarketRegime::Trend => Some("trend_pullback"),
            MarketRegime::Range => Some("range_fade"),
            MarketRegime::Volatile => Some("breakout"),
            MarketRegime::Unknown => None,
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketRegime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TREND" | "TRENDING" => Ok(MarketRegime::Trend),
            "RANGE" | "RANGING" => Ok(MarketRegime::Range),
            "VOLATILE" => Ok(MarketRegime::Volatile),
            "UNKNOWN" => Ok(MarketRegime::Unknown),
            other => Err(format!("unknown regime label: {}", other)),
        }
    }
}

/// Trend/range/volatile scores
///
/// After [`RegimeScores::normalized`] each score lies in [0,1] and the three
/// sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeScores {
    pub trend: f64,
    pub range: f64,
    pub volatile: f64,
}

impl RegimeScores {
    pub fn new(trend: f64, range: f64, volatile: f64) -> Self {
        Self { trend, range, volatile }
    }

    /// Equal weight across all three regimes
    pub fn uniform() -> Self {
        Self::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
    }

    pub fn sum(&self) -> f64 {
        self.trend + self.range + self.volatile
    }

    /// Floor negative scores at zero and scale to sum to one.
    /// An all-zero (or non-finite) triple becomes uniform.
    pub fn normalized(&self) -> Self {
        let floor = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        let floored = Self::new(floor(self.trend), floor(self.range), floor(self.volatile));
        let total = floored.sum();
        if total <= f64::EPSILON {
            return Self::uniform();
        }
        Self::new(
            floored.trend / total,
            floored.range / total,
            floored.volatile / total,
        )
    }

    /// Score for a regime label (UNKNOWN has no score)
    pub fn get(&self, regime: MarketRegime) -> Option<f64> {
        match regime {
            MarketRegime::Trend => Some(self.trend),
            MarketRegime::Range => Some(self.range),
            MarketRegime::Volatile => Some(self.volatile),
            MarketRegime::Unknown => None,
        }
    }

    /// Add `delta` to the score for `regime`; UNKNOWN is a no-op
    pub fn bump(&mut self, regime: MarketRegime, delta: f64) {
        match regime {
            MarketRegime::Trend => self.trend += delta,
            MarketRegime::Range => self.range += delta,
            MarketRegime::Volatile => self.volatile += delta,
            MarketRegime::Unknown => {}
        }
    }

    /// Highest-scoring regime; ties resolve trend, range, volatile
    pub fn argmax(&self) -> (MarketRegime, f64) {
        let mut best = (MarketRegime::Trend, self.trend);
        if self.range > best.1 {
            best = (MarketRegime::Range, self.range);
        }
        if self.volatile > best.1 {
            best = (MarketRegime::Volatile, self.volatile);
        }
        best
    }

    /// Exponential smoothing toward previous scores
    pub fn smoothed(&self, prev: &RegimeScores, alpha: f64) -> Self {
        let a = alpha.clamp(0.0, 1.0);
        Self::new(
            a * self.trend + (1.0 - a) * prev.trend,
            a * self.range + (1.0 - a) * prev.range,
            a * self.volatile + (1.0 - a) * prev.volatile,
        )
    }

    /// Scores rounded to four decimals, for logs and analytics only
    pub fn rounded(&self) -> Self {
        let r = |v: f64| (v * 10_000.0).round() / 10_000.0;
        Self::new(r(self.trend), r(self.range), r(self.volatile))
    }

    pub fn is_normalized(&self) -> bool {
        [self.trend, self.range, self.volatile]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
            && (self.sum() - 1.0).abs() <= SCORE_SUM_EPSILON
    }
}
