//! Trading Session Types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regional trading session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradingSession {
    Asia,
    London,
    #[serde(rename = "NY")]
    NewYork,
    Unknown,
}

impl TradingSession {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingSession::Asia => "ASIA",
            TradingSession::London => "LONDON",
            TradingSession::NewYork => "NY",
            TradingSession::Unknown => "UNKNOWN",
        }
    }

    /// LONDON and NY carry the deep-liquidity rule set
    pub fn is_major(&self) -> bool {
        matches!(self, TradingSession::London | TradingSession::NewYork)
    }
}

impl fmt::Display for TradingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingSession {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASIA" | "TOKYO" | "SYDNEY" => Ok(TradingSession::Asia),
            "LONDON" | "EU" | "EUROPE" => Ok(TradingSession::London),
            "NY" | "NEW_YORK" | "NEWYORK" | "US" => Ok(TradingSession::NewYork),
            "UNKNOWN" => Ok(TradingSession::Unknown),
            other => Err(format!("unknown session: {}", other)),
        }
    }
}

/// Window where two sessions trade concurrently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlapType {
    /// 13:00-16:00 UTC, peak liquidity
    LondonNy,
    /// 08:00-09:00 UTC, thin handover
    AsiaLondon,
    /// 21:00-22:00 UTC, thin handover
    NyAsia,
}

impl OverlapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlapType::LondonNy => "LONDON_NY",
            OverlapType::AsiaLondon => "ASIA_LONDON",
            OverlapType::NyAsia => "NY_ASIA",
        }
    }

    /// Thin overlaps are handovers rather than liquidity peaks
    pub fn is_thin(&self) -> bool {
        !matches!(self, OverlapType::LondonNy)
    }
}

impl fmt::Display for OverlapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session context derived from a single timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Most recently opened active session
    pub session: TradingSession,
    pub is_overlap: bool,
    pub overlap: Option<OverlapType>,
    /// Minutes since the primary session opened
    pub minutes_into_session: u32,
    /// Liquidity/participation proxy in [0,1]
    pub session_strength: f64,
    /// First or last 30 minutes of the session
    pub is_transition_period: bool,
    pub is_weekend: bool,
    pub is_market_open: bool,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            session: TradingSession::Unknown,
            is_overlap: false,
            overlap: None,
            minutes_into_session: 0,
            session_strength: 0.5,
            is_transition_period: false,
            is_weekend: false,
            is_market_open: false,
        }
    }
}

impl SessionContext {
    /// Analytics tag, e.g. `NY` or `NY+LONDON_NY`
    pub fn tag(&self) -> String {
        match self.overlap {
            Some(overlap) => format!("{}+{}", self.session, overlap),
            None => self.session.to_string(),
        }
    }

    /// LONDON primary or an overlap touching London
    pub fn is_london_family(&self) -> bool {
        self.session == TradingSession::London
            || matches!(
                self.overlap,
                Some(OverlapType::LondonNy) | Some(OverlapType::AsiaLondon)
            )
    }
}
