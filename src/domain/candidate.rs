//! Trade Candidate
//!
//! Structured trade proposal returned by the reasoning service.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Confidence sub-scores a complete candidate carries
pub const CONFIDENCE_KEYS: [&str; 4] = ["overall", "regime_fit", "structure", "execution"];

/// Neutral value used when a sub-score has to be filled in
pub const DEFAULT_CONFIDENCE: f64 = 50.0;

/// Entry order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    BuyStop,
    SellStop,
    BuyLimit,
    SellLimit,
    /// No trade
    Skip,
}

/// Trade direction implied by an order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::BuyStop => "buy_stop",
            OrderType::SellStop => "sell_stop",
            OrderType::BuyLimit => "buy_limit",
            OrderType::SellLimit => "sell_limit",
            OrderType::Skip => "skip",
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, OrderType::BuyStop | OrderType::SellStop)
    }

    pub fn is_limit(&self) -> bool {
        matches!(self, OrderType::BuyLimit | OrderType::SellLimit)
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, OrderType::Skip)
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            OrderType::BuyStop | OrderType::BuyLimit => Some(Direction::Long),
            OrderType::SellStop | OrderType::SellLimit => Some(Direction::Short),
            OrderType::Skip => None,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "buy_stop" => Ok(OrderType::BuyStop),
            "sell_stop" => Ok(OrderType::SellStop),
            "buy_limit" => Ok(OrderType::BuyLimit),
            "sell_limit" => Ok(OrderType::SellLimit),
            "skip" | "hold" | "none" => Ok(OrderType::Skip),
            other => Err(format!("unsupported order type: {}", other)),
        }
    }
}

/// Strategy family a strategy name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyFamily {
    Trend,
    Range,
    Breakout,
}

impl StrategyFamily {
    /// Classify a free-form strategy name
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.contains("breakout") {
            Some(StrategyFamily::Breakout)
        } else if lower.contains("range") || lower.contains("fade") || lower.contains("reversion") {
            Some(StrategyFamily::Range)
        } else if lower.contains("trend") || lower.contains("pullback") || lower.contains("continuation") {
            Some(StrategyFamily::Trend)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyFamily::Trend => "trend",
            StrategyFamily::Range => "range",
            StrategyFamily::Breakout => "breakout",
        }
    }

    /// Order types legal for this family (skip is always legal)
    pub fn legal_order_types(&self) -> &'static [OrderType] {
        match self {
            StrategyFamily::Trend | StrategyFamily::Breakout => &[OrderType::BuyStop, OrderType::SellStop],
            StrategyFamily::Range => &[OrderType::BuyLimit, OrderType::SellLimit],
        }
    }
}

impl fmt::Display for StrategyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trade proposal after schema parsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCandidate {
    pub strategy: String,
    pub order_type: OrderType,
    /// Price levels; only `skip` candidates may omit them
    pub entry: Option<f64>,
    pub stop: Option<f64>,
    pub target: Option<f64>,
    /// Reported risk:reward
    pub risk_reward: Option<f64>,
    /// Named sub-scores, 0-100
    pub confidence: BTreeMap<String, f64>,
    pub rationale: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub template_version: Option<String>,
}

impl TradeCandidate {
    pub fn family(&self) -> Option<StrategyFamily> {
        StrategyFamily::from_name(&self.strategy)
    }

    /// Entry, stop and target when all three are present
    pub fn levels(&self) -> Option<(f64, f64, f64)> {
        match (self.entry, self.stop, self.target) {
            (Some(e), Some(s), Some(t)) => Some((e, s, t)),
            _ => None,
        }
    }

    pub fn stop_distance(&self) -> Option<f64> {
        self.levels().map(|(e, s, _)| (e - s).abs())
    }

    /// Risk:reward recomputed from the price levels
    pub fn computed_risk_reward(&self) -> Option<f64> {
        let (entry, stop, target) = self.levels()?;
        let risk = (entry - stop).abs();
        if risk <= f64::EPSILON {
            return None;
        }
        Some((target - entry).abs() / risk)
    }

    /// All standard confidence keys present
    pub fn has_complete_confidence(&self) -> bool {
        CONFIDENCE_KEYS.iter().all(|k| self.confidence.contains_key(*k))
    }

    /// Headline confidence: `overall`, else the mean of the sub-scores
    pub fn overall_confidence(&self) -> f64 {
        if let Some(v) = self.confidence.get("overall") {
            return *v;
        }
        if self.confidence.is_empty() {
            return DEFAULT_CONFIDENCE;
        }
        self.confidence.values().sum::<f64>() / self.confidence.len() as f64
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn candidate() -> TradeCandidate {
        TradeCandidate {
            strategy: "trend_pullback".to_string(),
            order_type: OrderType::BuyStop,
            entry: Some(102.5),
            stop: Some(100.0),
            target: Some(107.5),
            risk_reward: Some(2.0),
            confidence: BTreeMap::new(),
            rationale: "test".to_string(),
            tags: vec![],
            template_version: None,
        }
    }

    #[test]
    fn test_order_type_parse() {
        assert_eq!("Buy-Stop".parse::<OrderType>().unwrap(), OrderType::BuyStop);
        assert_eq!("hold".parse::<OrderType>().unwrap(), OrderType::Skip);
        assert!("market".parse::<OrderType>().is_err());
        assert_eq!(OrderType::SellLimit.direction(), Some(Direction::Short));
        assert_eq!(OrderType::Skip.direction(), None);
    }

    #[test]
    fn test_family_from_name() {
        assert_eq!(StrategyFamily::from_name("trend_pullback"), Some(StrategyFamily::Trend));
        assert_eq!(StrategyFamily::from_name("range_fade"), Some(StrategyFamily::Range));
        assert_eq!(StrategyFamily::from_name("vol_breakout"), Some(StrategyFamily::Breakout));
        assert_eq!(StrategyFamily::from_name("scalp"), None);
    }

    #[test]
    fn test_computed_risk_reward() {
        let c = candidate();
        assert_relative_eq!(c.computed_risk_reward().unwrap(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(c.stop_distance().unwrap(), 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_overall_confidence_fallback() {
        let mut c = candidate();
        assert_eq!(c.overall_confidence(), DEFAULT_CONFIDENCE);
        c.confidence.insert("structure".to_string(), 80.0);
        c.confidence.insert("execution".to_string(), 60.0);
        assert_eq!(c.overall_confidence(), 70.0);
        c.confidence.insert("overall".to_string(), 65.0);
        assert_eq!(c.overall_confidence(), 65.0);
    }

    #[test]
    fn test_add_tag_dedupes() {
        let mut c = candidate();
        c.add_tag("a");
        c.add_tag("a");
        assert_eq!(c.tags, vec!["a".to_string()]);
    }
}
