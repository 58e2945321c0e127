//! Feature Snapshot Access
//!
//! Typed, lenient access to the per-timeframe indicator bag handed to the
//! pipeline. Upstream producers are inconsistent about key names, so every
//! indicator is read through one accessor that walks a fixed alias list.
//! Missing or unparseable values read as 0.0 (or `None` for optional
//! levels); nothing in here returns an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Timeframe the guardrails are merged into and single-frame rules read from
pub const PRIMARY_TIMEFRAME: Timeframe = Timeframe::M15;

/// Chart timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    M5,
    M15,
    H1,
    H4,
}

impl Timeframe {
    /// Canonical key followed by the spellings seen in the wild
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Timeframe::M5 => &["M5", "m5", "5m", "5min"],
            Timeframe::M15 => &["M15", "m15", "15m", "15min"],
            Timeframe::H1 => &["H1", "h1", "1h", "60m"],
            Timeframe::H4 => &["H4", "h4", "4h", "240m"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.aliases()[0]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indicators the pipeline knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    Adx,
    BbWidth,
    Atr,
    Ema200,
    TrendSlope,
    Rsi,
    VolumeZ,
    Bos,
    Choch,
    RangePosition,
    SpreadAtrPct,
    SlippageAtrPct,
    ExecutionQuality,
    NewsBlackout,
    MinutesToNews,
    Session,
    SwingHigh,
    SwingLow,
    ChannelBreach,
    WickRejection,
    EqualHighsLows,
    SweepReversal,
    SpreadLimit,
    ExposureLimitHit,
}

/// Alias table: canonical key first, then accepted alternates in lookup order
const INDICATOR_ALIASES: &[(Indicator, &[&str])] = &[
    (Indicator::Adx, &["adx", "adx14", "adx_14", "ADX"]),
    (Indicator::BbWidth, &["bb_width", "bbw", "bb_bandwidth", "bollinger_width"]),
    (Indicator::Atr, &["atr", "atr14", "atr_14", "ATR"]),
    (Indicator::Ema200, &["ema200", "ema_200", "EMA200"]),
    (Indicator::TrendSlope, &["trend_slope", "slope", "ema_slope"]),
    (Indicator::Rsi, &["rsi", "rsi14", "rsi_14"]),
    (Indicator::VolumeZ, &["volume_z", "vol_z", "volume_zscore", "volume_z_score"]),
    (Indicator::Bos, &["bos", "bos_confirmed", "structure_break", "break_of_structure"]),
    (Indicator::Choch, &["choch", "choch_confirmed", "change_of_character"]),
    (Indicator::RangePosition, &["range_position", "range_pos", "position_in_range"]),
    (Indicator::SpreadAtrPct, &["spread_atr_pct", "spread_pct_atr", "spread_to_atr_pct"]),
    (Indicator::SlippageAtrPct, &["slippage_atr_pct", "est_slippage_atr_pct", "slippage_pct_atr"]),
    (Indicator::ExecutionQuality, &["execution_quality", "exec_quality"]),
    (Indicator::NewsBlackout, &["news_blackout", "news_block", "news_blocked"]),
    (Indicator::MinutesToNews, &["minutes_to_next_news", "minutes_to_news", "next_news_minutes"]),
    (Indicator::Session, &["session", "session_name"]),
    (Indicator::SwingHigh, &["swing_high", "last_swing_high"]),
    (Indicator::SwingLow, &["swing_low", "last_swing_low"]),
    (Indicator::ChannelBreach, &["channel_breach", "channel_break", "donchian_breach"]),
    (Indicator::WickRejection, &["wick_rejection", "rejection_wick"]),
    (Indicator::EqualHighsLows, &["equal_highs_lows", "eqh_eql", "liquidity_cluster"]),
    (Indicator::SweepReversal, &["sweep_reversal", "post_sweep_reversal", "liquidity_sweep_reversal"]),
    (Indicator::SpreadLimit, &["spread_limit"]),
    (Indicator::ExposureLimitHit, &["exposure_limit_hit", "exposure_limit"]),
];

impl Indicator {
    pub fn aliases(&self) -> &'static [&'static str] {
        INDICATOR_ALIASES
            .iter()
            .find(|(ind, _)| ind == self)
            .map(|(_, aliases)| *aliases)
            .unwrap_or(&[])
    }

    /// Canonical key
    pub fn key(&self) -> &'static str {
        self.aliases().first().copied().unwrap_or("")
    }

    /// Look up an indicator by canonical key or alias
    pub fn from_key(key: &str) -> Option<Self> {
        INDICATOR_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| a.eq_ignore_ascii_case(key)))
            .map(|(ind, _)| *ind)
    }
}

/// Parse a JSON value as a number: numbers, numeric strings and booleans
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Parse a JSON value as a confirmation flag
pub fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "1" | "confirmed" | "bullish" | "bearish"
        ),
        _ => false,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_number(&value).unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_number(&value))
}

/// Read-only view over one timeframe's indicator map
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    frame: Option<&'a Map<String, Value>>,
}

impl<'a> FrameView<'a> {
    pub fn new(frame: Option<&'a Map<String, Value>>) -> Self {
        Self { frame }
    }

    pub fn is_present(&self) -> bool {
        self.frame.is_some()
    }

    /// First non-null value under any alias
    pub fn raw(&self, indicator: Indicator) -> Option<&'a Value> {
        let frame = self.frame?;
        indicator
            .aliases()
            .iter()
            .filter_map(|alias| frame.get(*alias))
            .find(|v| !v.is_null())
    }

    pub fn opt_num(&self, indicator: Indicator) -> Option<f64> {
        self.raw(indicator).and_then(parse_number)
    }

    pub fn num(&self, indicator: Indicator) -> f64 {
        self.opt_num(indicator).unwrap_or(0.0)
    }

    pub fn flag(&self, indicator: Indicator) -> bool {
        self.raw(indicator).map(parse_flag).unwrap_or(false)
    }

    pub fn text(&self, indicator: Indicator) -> Option<&'a str> {
        self.raw(indicator).and_then(Value::as_str)
    }

    /// Flag lookup by free-form name (template confirmation lists)
    pub fn flag_named(&self, name: &str) -> bool {
        match Indicator::from_key(name) {
            Some(indicator) => self.flag(indicator),
            None => self
                .frame
                .and_then(|f| f.get(name))
                .map(parse_flag)
                .unwrap_or(false),
        }
    }

    pub fn adx(&self) -> f64 {
        self.num(Indicator::Adx)
    }

    pub fn bb_width(&self) -> f64 {
        self.num(Indicator::BbWidth)
    }

    pub fn atr(&self) -> f64 {
        self.num(Indicator::Atr)
    }

    /// EMA(200); absent or non-positive means unavailable
    pub fn ema200(&self) -> Option<f64> {
        self.opt_num(Indicator::Ema200).filter(|v| *v > 0.0)
    }

    pub fn trend_slope(&self) -> f64 {
        self.num(Indicator::TrendSlope)
    }

    pub fn rsi(&self) -> f64 {
        self.num(Indicator::Rsi)
    }

    pub fn volume_z(&self) -> f64 {
        self.num(Indicator::VolumeZ)
    }

    pub fn bos(&self) -> bool {
        self.flag(Indicator::Bos)
    }

    /// BOS or CHOCH confirmed
    pub fn structure_break(&self) -> bool {
        self.bos() || self.flag(Indicator::Choch)
    }

    /// Fractional position inside the recent range (0 = low, 1 = high)
    pub fn range_position(&self) -> Option<f64> {
        self.opt_num(Indicator::RangePosition)
    }

    /// Spread as a percentage of ATR
    pub fn spread_atr_pct(&self) -> f64 {
        self.num(Indicator::SpreadAtrPct)
    }

    /// Estimated slippage as a percentage of ATR
    pub fn slippage_atr_pct(&self) -> f64 {
        self.num(Indicator::SlippageAtrPct)
    }

    pub fn execution_quality(&self) -> Option<&'a str> {
        self.text(Indicator::ExecutionQuality)
    }

    pub fn news_blackout(&self) -> bool {
        self.flag(Indicator::NewsBlackout)
    }

    pub fn minutes_to_news(&self) -> Option<f64> {
        self.opt_num(Indicator::MinutesToNews)
    }

    pub fn session_tag(&self) -> Option<&'a str> {
        self.text(Indicator::Session)
    }

    pub fn swing_high(&self) -> Option<f64> {
        self.opt_num(Indicator::SwingHigh).filter(|v| *v > 0.0)
    }

    pub fn swing_low(&self) -> Option<f64> {
        self.opt_num(Indicator::SwingLow).filter(|v| *v > 0.0)
    }

    pub fn channel_breach(&self) -> bool {
        self.flag(Indicator::ChannelBreach)
    }

    pub fn wick_rejection(&self) -> bool {
        self.flag(Indicator::WickRejection)
    }

    pub fn equal_highs_lows(&self) -> bool {
        self.flag(Indicator::EqualHighsLows)
    }

    pub fn sweep_reversal(&self) -> bool {
        self.flag(Indicator::SweepReversal)
    }

    pub fn spread_limit(&self) -> Option<f64> {
        self.opt_num(Indicator::SpreadLimit)
    }

    pub fn exposure_limit_hit(&self) -> bool {
        self.flag(Indicator::ExposureLimitHit)
    }
}

/// Cross-timeframe summary computed upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossTimeframeSummary {
    /// Agreement of trend direction across timeframes (0-1)
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub trend_agreement: Option<f64>,
    /// Volatility regime consensus label, e.g. "expanding"
    #[serde(default)]
    pub volatility_consensus: Option<String>,
}

/// Guardrails supplied by the caller alongside the snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guardrails {
    /// Block new entries around scheduled news
    #[serde(default)]
    pub news_block: bool,
    /// Maximum spread as a percentage of ATR
    #[serde(default)]
    pub spread_limit: Option<f64>,
    /// Account exposure limit already reached
    #[serde(default)]
    pub exposure_limit_hit: bool,
}

/// Indicator snapshot for one symbol at one point in time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub symbol: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: f64,
    /// RFC 3339 timestamp as received
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub timeframes: BTreeMap<String, Map<String, Value>>,
    #[serde(default)]
    pub cross_timeframe: Option<CrossTimeframeSummary>,
}

impl FeatureSnapshot {
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            ..Default::default()
        }
    }

    /// Builder: set one indicator value on a timeframe
    pub fn with_value(mut self, tf: Timeframe, key: &str, value: impl Into<Value>) -> Self {
        self.frame_mut(tf).insert(key.to_string(), value.into());
        self
    }

    /// Builder: set the cross-timeframe trend agreement
    pub fn with_trend_agreement(mut self, agreement: f64) -> Self {
        self.cross_timeframe
            .get_or_insert_with(CrossTimeframeSummary::default)
            .trend_agreement = Some(agreement);
        self
    }

    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts.to_rfc3339());
        self
    }

    fn frame_key(&self, tf: Timeframe) -> Option<&String> {
        tf.aliases()
            .iter()
            .find_map(|alias| self.timeframes.get_key_value(*alias).map(|(k, _)| k))
    }

    fn frame_mut(&mut self, tf: Timeframe) -> &mut Map<String, Value> {
        let key = self
            .frame_key(tf)
            .cloned()
            .unwrap_or_else(|| tf.as_str().to_string());
        self.timeframes.entry(key).or_default()
    }

    pub fn frame(&self, tf: Timeframe) -> FrameView<'_> {
        FrameView::new(self.frame_key(tf).and_then(|k| self.timeframes.get(k)))
    }

    pub fn primary(&self) -> FrameView<'_> {
        self.frame(PRIMARY_TIMEFRAME)
    }

    pub fn has_frame(&self, tf: Timeframe) -> bool {
        self.frame_key(tf).is_some()
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn trend_agreement(&self) -> Option<f64> {
        self.cross_timeframe.as_ref().and_then(|c| c.trend_agreement)
    }

    /// Fold guardrails into the primary frame so later stages read one flag
    pub fn with_guardrails(&self, guardrails: &Guardrails) -> Self {
        let mut merged = self.clone();
        let news = merged.primary().news_blackout() || guardrails.news_block;
        let exposure = merged.primary().exposure_limit_hit() || guardrails.exposure_limit_hit;
        let frame = merged.frame_mut(PRIMARY_TIMEFRAME);
        frame.insert(Indicator::NewsBlackout.key().to_string(), Value::Bool(news));
        frame.insert(Indicator::ExposureLimitHit.key().to_string(), Value::Bool(exposure));
        if let Some(limit) = guardrails.spread_limit {
            frame.insert(Indicator::SpreadLimit.key().to_string(), Value::from(limit));
        }
        merged
    }

    /// Snapshot as JSON for prompt rendering
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
