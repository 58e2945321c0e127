//! Multi-Timeframe Regime Classifier
//!
//! Scores TREND / RANGE / VOLATILE from M5, M15 and H1 indicators:
//!
//! - trend    = 0.60 adx_norm + 0.25 slope_agreement + 0.15 alignment - conflict_penalty
//! - range    = 0.60 low_adx + 0.40 squeeze
//! - volatile = 0.60 wide + 0.25 mid_adx + disagreement_bonus
//!
//! Scores are nudged per session, optionally smoothed (raw, before
//! normalization) against the previous invocation, normalized, biased toward the previous label (hysteresis) and
//! then labelled. A weak winner falls through to a deterministic fallback.

use serde::{Deserialize, Serialize};

use super::config::RegimeConfig;
use crate::domain::{FeatureSnapshot, FrameView, MarketRegime, RegimeScores, Timeframe, TradingSession};

/// Everything the classifier reads for one invocation
#[derive(Debug, Clone, Copy)]
pub struct RegimeInput<'a> {
    pub features: &'a FeatureSnapshot,
    pub session: TradingSession,
    pub prev_regime: Option<MarketRegime>,
    pub prev_scores: Option<RegimeScores>,
}

impl<'a> RegimeInput<'a> {
    pub fn new(features: &'a FeatureSnapshot, session: TradingSession) -> Self {
        Self {
            features,
            session,
            prev_regime: None,
            prev_scores: None,
        }
    }

    pub fn with_previous(mut self, regime: Option<MarketRegime>, scores: Option<RegimeScores>) -> Self {
        self.prev_regime = regime;
        self.prev_scores = scores;
        self
    }
}

/// Classifier output with the intermediate values kept for observability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeClassification {
    pub regime: MarketRegime,
    /// Final normalized scores
    pub scores: RegimeScores,
    /// Component scores before smoothing/normalization
    pub raw_scores: RegimeScores,
    pub adx_blended: f64,
    pub timeframes_above_gate: usize,
    pub conflict: bool,
    /// Label came from the low-confidence fallback
    pub used_fallback: bool,
}

impl RegimeClassification {
    fn unknown() -> Self {
        Self {
            regime: MarketRegime::Unknown,
            scores: RegimeScores::uniform(),
            raw_scores: RegimeScores::new(0.0, 0.0, 0.0),
            adx_blended: 0.0,
            timeframes_above_gate: 0,
            conflict: false,
            used_fallback: false,
        }
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let r = self.scores.rounded();
        format!(
            "{} (trend {:.4} / range {:.4} / volatile {:.4}{}{})",
            self.regime,
            r.trend,
            r.range,
            r.volatile,
            if self.conflict { ", tf conflict" } else { "" },
            if self.used_fallback { ", fallback" } else { "" },
        )
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Stateless regime classifier; state from the previous call arrives via [`RegimeInput`]
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn classify(&self, input: &RegimeInput<'_>) -> RegimeClassification {
        let cfg = &self.config;
        let features = input.features;

        let core = [Timeframe::M5, Timeframe::M15, Timeframe::H1];
        if !core.iter().any(|tf| features.has_frame(*tf)) {
            tracing::debug!("No M5/M15/H1 frames for {} - regime UNKNOWN", features.symbol);
            return RegimeClassification::unknown();
        }

        let m5 = features.frame(Timeframe::M5);
        let m15 = features.frame(Timeframe::M15);
        let h1 = features.frame(Timeframe::H1);

        // 1. blended ADX
        let adx = [m5.adx(), m15.adx(), h1.adx()];
        let w = cfg.adx_weights;
        let adx_blended = w.m5 * adx[0] + w.m15 * adx[1] + w.h1 * adx[2];
        let adx_norm = if cfg.adx_cap > 0.0 {
            (adx_blended / cfg.adx_cap).clamp(0.0, 1.0)
        } else {
            0.0
        };

        // 2. timeframe conflict
        let timeframes_above_gate = adx.iter().filter(|a| **a >= cfg.trend_gate).count();
        let conflict = matches!(timeframes_above_gate, 1 | 2);

        // 3. direction
        let (slope_agreement, alignment) = self.directional_agreement(features.price, [m5, m15, h1]);

        // 4-6. component scores
        let penalty = if conflict { cfg.conflict_penalty } else { 0.0 };
        let trend = 0.60 * adx_norm + 0.25 * slope_agreement + 0.15 * alignment - penalty;

        let adx_m15 = adx[1];
        let bb_width = m15.bb_width();
        let low_adx = if cfg.range_low > 0.0 {
            ((cfg.range_low - adx_m15) / cfg.range_low).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let range = 0.60 * low_adx + 0.40 * self.squeeze_component(bb_width);

        let bonus = if conflict { cfg.disagreement_bonus } else { 0.0 };
        let volatile = 0.60 * self.wide_component(bb_width) + 0.25 * self.mid_adx_component(adx_m15) + bonus;

        let mut raw = RegimeScores::new(trend, range, volatile);

        // 7. session nudges and news bump
        let session = self.effective_session(input.session, m15);
        let nudge = cfg.nudge_for(session.as_str());
        raw.trend += nudge.trend;
        raw.range += nudge.range;
        raw.volatile += nudge.volatile;

        if let Some(minutes) = m15.minutes_to_news() {
            if (0.0..=cfg.news_window_minutes).contains(&minutes) {
                raw.volatile += cfg.news_volatility_bump;
            }
        }

        raw = RegimeScores::new(raw.trend.max(0.0), raw.range.max(0.0), raw.volatile.max(0.0));

        // 8-9. smoothing on raw scores, then normalization and hysteresis
        let mut scores = match input.prev_scores {
            Some(prev) => raw.smoothed(&prev, cfg.smoothing_alpha),
            None => raw,
        }
        .normalized();
        if let Some(prev) = input.prev_regime.filter(|r| *r != MarketRegime::Unknown) {
            if cfg.hysteresis_bonus > 0.0 {
                scores.bump(prev, cfg.hysteresis_bonus);
                scores = scores.normalized();
            }
        }

        // 10. decision
        let (best, best_score) = scores.argmax();
        let (regime, used_fallback) = if best_score >= cfg.confident_gate {
            (best, false)
        } else {
            (self.fallback(adx_m15, bb_width), true)
        };

        let result = RegimeClassification {
            regime,
            scores,
            raw_scores: raw,
            adx_blended,
            timeframes_above_gate,
            conflict,
            used_fallback,
        };
        tracing::debug!("{} regime: {}", features.symbol, result.summary());
        result
    }

    /// Session used for nudges: the detected one, else the snapshot's own tag
    fn effective_session(&self, detected: TradingSession, m15: FrameView<'_>) -> TradingSession {
        if detected != TradingSession::Unknown {
            return detected;
        }
        m15.session_tag()
            .and_then(|s| s.parse().ok())
            .unwrap_or(TradingSession::Unknown)
    }

    /// (slope_agreement, alignment), both in [0,1]
    fn directional_agreement(&self, price: f64, frames: [FrameView<'_>; 3]) -> (f64, f64) {
        let slope_signs: Vec<f64> = frames.iter().map(|f| sign(f.trend_slope())).collect();
        let sides: Vec<f64> = if price > 0.0 {
            frames
                .iter()
                .filter_map(|f| f.ema200())
                .map(|ema| sign(price - ema))
                .collect()
        } else {
            Vec::new()
        };

        if sides.is_empty() {
            let agreement = slope_signs.iter().sum::<f64>().abs() / frames.len() as f64;
            return (agreement, self.config.ema_fallback_weight * agreement);
        }

        let mean_side = sides.iter().sum::<f64>() / sides.len() as f64;
        let dominant = sign(mean_side);
        let slope_agreement = if dominant == 0.0 {
            0.0
        } else {
            slope_signs.iter().filter(|s| **s == dominant).count() as f64 / frames.len() as f64
        };
        (slope_agreement, mean_side.abs())
    }

    /// 1 inside the squeeze, decaying linearly to 0 at the wide threshold
    fn squeeze_component(&self, bb_width: f64) -> f64 {
        let cfg = &self.config;
        if bb_width <= cfg.squeeze_width {
            1.0
        } else if cfg.wide_width > cfg.squeeze_width {
            ((cfg.wide_width - bb_width) / (cfg.wide_width - cfg.squeeze_width)).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Min-max position of band width between squeeze and wide
    fn wide_component(&self, bb_width: f64) -> f64 {
        let cfg = &self.config;
        if cfg.wide_width > cfg.squeeze_width {
            ((bb_width - cfg.squeeze_width) / (cfg.wide_width - cfg.squeeze_width)).clamp(0.0, 1.0)
        } else if bb_width >= cfg.wide_width {
            1.0
        } else {
            0.0
        }
    }

    /// Triangle peaking at the centre of the mid-ADX band
    fn mid_adx_component(&self, adx: f64) -> f64 {
        let cfg = &self.config;
        let half = (cfg.mid_adx_high - cfg.mid_adx_low) / 2.0;
        if half <= 0.0 {
            return 0.0;
        }
        let centre = cfg.mid_adx_low + half;
        (1.0 - (adx - centre).abs() / half).clamp(0.0, 1.0)
    }

    fn fallback(&self, adx_m15: f64, bb_width: f64) -> MarketRegime {
        let cfg = &self.config;
        if adx_m15 < cfg.range_low - cfg.fallback_range_margin && bb_width < cfg.squeeze_width {
            MarketRegime::Range
        } else if bb_width > cfg.wide_width {
            MarketRegime::Volatile
        } else {
            MarketRegime::Trend
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn snapshot(adx: [f64; 3], bb_width: f64) -> FeatureSnapshot {
        FeatureSnapshot::new("EURUSD", 1.1000)
            .with_value(Timeframe::M5, "adx", adx[0])
            .with_value(Timeframe::M15, "adx", adx[1])
            .with_value(Timeframe::H1, "adx", adx[2])
            .with_value(Timeframe::M15, "bb_width", bb_width)
    }

    fn with_uptrend(snap: FeatureSnapshot) -> FeatureSnapshot {
        let mut snap = snap;
        for tf in [Timeframe::M5, Timeframe::M15, Timeframe::H1] {
            snap = snap
                .with_value(tf, "ema200", 1.0800)
                .with_value(tf, "trend_slope", 0.4);
        }
        snap
    }

    fn classifier() -> RegimeClassifier {
        RegimeClassifier::new(RegimeConfig::without_nudges())
    }

    #[test]
    fn test_strong_aligned_trend() {
        let snap = with_uptrend(snapshot([38.0, 40.0, 35.0], 0.016));
        let result = classifier().classify(&RegimeInput::new(&snap, TradingSession::London));

        assert_eq!(result.timeframes_above_gate, 3);
        assert!(!result.conflict);
        assert_eq!(result.regime, MarketRegime::Trend);
        assert!(result.scores.trend > result.scores.range);
        assert!(result.scores.trend > result.scores.volatile);
        assert!(result.scores.is_normalized());
    }

    #[test]
    fn test_trend_without_direction_features() {
        // ADX equal to the gate counts as above it
        let snap = snapshot([38.0, 40.0, 35.0], 0.016);
        let result = classifier().classify(&RegimeInput::new(&snap, TradingSession::Unknown));
        assert!(!result.conflict);
        assert_eq!(result.regime, MarketRegime::Trend);
        let (best, _) = result.scores.argmax();
        assert_eq!(best, MarketRegime::Trend);
    }

    #[test]
    fn test_squeeze_is_range() {
        let snap = snapshot([15.0, 15.0, 15.0], 0.010);
        let result = classifier().classify(&RegimeInput::new(&snap, TradingSession::Asia));
        assert_eq!(result.regime, MarketRegime::Range);
        assert!(result.scores.range > 0.5);
    }

    #[test]
    fn test_wide_bands_with_conflict_is_volatile() {
        // only M15 above gate -> conflict penalty on trend, bonus on volatile
        let snap = snapshot([22.0, 36.0, 20.0], 0.030);
        let result = classifier().classify(&RegimeInput::new(&snap, TradingSession::NewYork));
        assert!(result.conflict);
        assert_eq!(result.timeframes_above_gate, 1);
        assert_eq!(result.regime, MarketRegime::Volatile);
    }

    #[test]
    fn test_missing_frames_is_unknown() {
        let snap = FeatureSnapshot::new("EURUSD", 1.1).with_value(Timeframe::H4, "adx", 40.0);
        let result = classifier().classify(&RegimeInput::new(&snap, TradingSession::London));
        assert_eq!(result.regime, MarketRegime::Unknown);
        assert!(result.scores.is_normalized());
    }

    #[test]
    fn test_garbage_values_never_panic() {
        let snap = FeatureSnapshot::new("EURUSD", 1.1)
            .with_value(Timeframe::M15, "adx", "n/a")
            .with_value(Timeframe::M15, "bb_width", serde_json::Value::Null);
        let result = classifier().classify(&RegimeInput::new(&snap, TradingSession::London));
        assert!(result.scores.is_normalized());
        assert_ne!(result.regime, MarketRegime::Unknown);
    }

    #[test]
    fn test_hysteresis_raises_previous_label_score() {
        let snap = snapshot([24.0, 26.0, 22.0], 0.015);
        let c = classifier();
        let plain = c.classify(&RegimeInput::new(&snap, TradingSession::London));
        for prev in [MarketRegime::Trend, MarketRegime::Range, MarketRegime::Volatile] {
            let biased = c.classify(
                &RegimeInput::new(&snap, TradingSession::London).with_previous(Some(prev), None),
            );
            assert!(biased.scores.get(prev).unwrap() > plain.scores.get(prev).unwrap());
            assert!(biased.scores.is_normalized());
        }
    }

    #[test]
    fn test_hysteresis_does_not_flip_clear_winner() {
        let snap = with_uptrend(snapshot([38.0, 40.0, 35.0], 0.016));
        let c = classifier();
        let plain = c.classify(&RegimeInput::new(&snap, TradingSession::London));
        let biased = c.classify(
            &RegimeInput::new(&snap, TradingSession::London)
                .with_previous(Some(MarketRegime::Range), None),
        );
        assert_eq!(plain.regime, biased.regime);
    }

    #[test]
    fn test_smoothing_pulls_toward_previous_scores() {
        let snap = snapshot([15.0, 15.0, 15.0], 0.010);
        let c = classifier();
        let plain = c.classify(&RegimeInput::new(&snap, TradingSession::Asia));
        let prev = RegimeScores::new(0.9, 0.05, 0.05);
        let smoothed = c.classify(&RegimeInput::new(&snap, TradingSession::Asia).with_previous(None, Some(prev)));
        assert!(smoothed.scores.trend > plain.scores.trend);
        assert!(smoothed.scores.is_normalized());
    }

    #[test]
    fn test_smoothing_applies_before_normalization() {
        let snap = snapshot([15.0, 15.0, 15.0], 0.010);
        let prev = RegimeScores::new(0.9, 0.05, 0.05);
        let cfg = RegimeConfig::without_nudges();
        let alpha = cfg.smoothing_alpha;
        let result = RegimeClassifier::new(cfg)
            .classify(&RegimeInput::new(&snap, TradingSession::Asia).with_previous(None, Some(prev)));

        let raw = result.raw_scores;
        let expected = RegimeScores::new(
            alpha * raw.trend + (1.0 - alpha) * prev.trend,
            alpha * raw.range + (1.0 - alpha) * prev.range,
            alpha * raw.volatile + (1.0 - alpha) * prev.volatile,
        )
        .normalized();
        assert_relative_eq!(result.scores.trend, expected.trend, epsilon = 1e-9);
        assert_relative_eq!(result.scores.range, expected.range, epsilon = 1e-9);
        assert_relative_eq!(result.scores.volatile, expected.volatile, epsilon = 1e-9);
    }

    #[test]
    fn test_session_nudge_applies() {
        let snap = snapshot([24.0, 26.0, 22.0], 0.015);
        let nudged = RegimeClassifier::default().classify(&RegimeInput::new(&snap, TradingSession::Asia));
        let plain = classifier().classify(&RegimeInput::new(&snap, TradingSession::Asia));
        assert!(nudged.scores.range > plain.scores.range);
    }

    #[test]
    fn test_session_tag_used_when_undetected() {
        let snap = snapshot([24.0, 26.0, 22.0], 0.015).with_value(Timeframe::M15, "session", "ASIA");
        let tagged = RegimeClassifier::default().classify(&RegimeInput::new(&snap, TradingSession::Unknown));
        let asia = RegimeClassifier::default().classify(&RegimeInput::new(&snap, TradingSession::Asia));
        assert_relative_eq!(tagged.scores.range, asia.scores.range, epsilon = 1e-12);
    }

    #[test]
    fn test_news_bump_increases_volatile() {
        let base = snapshot([24.0, 26.0, 22.0], 0.015);
        let near_news = base.clone().with_value(Timeframe::M15, "minutes_to_next_news", 10);
        let far_news = base.clone().with_value(Timeframe::M15, "minutes_to_next_news", 90);
        let c = classifier();
        let plain = c.classify(&RegimeInput::new(&base, TradingSession::London));
        let near = c.classify(&RegimeInput::new(&near_news, TradingSession::London));
        let far = c.classify(&RegimeInput::new(&far_news, TradingSession::London));
        assert!(near.raw_scores.volatile > plain.raw_scores.volatile);
        assert_relative_eq!(far.raw_scores.volatile, plain.raw_scores.volatile, epsilon = 1e-12);
    }

    #[test]
    fn test_ema_fallback_uses_reduced_alignment() {
        let snap = snapshot([30.0, 30.0, 30.0], 0.015)
            .with_value(Timeframe::M5, "trend_slope", 1.0)
            .with_value(Timeframe::M15, "trend_slope", 1.0)
            .with_value(Timeframe::H1, "trend_slope", 1.0);
        let c = classifier();
        let (agreement, alignment) =
            c.directional_agreement(snap.price, [snap.frame(Timeframe::M5), snap.frame(Timeframe::M15), snap.frame(Timeframe::H1)]);
        assert_relative_eq!(agreement, 1.0);
        assert_relative_eq!(alignment, 0.7);
    }

    #[test]
    fn test_fallback_rules() {
        let c = classifier();
        assert_eq!(c.fallback(10.0, 0.008), MarketRegime::Range);
        assert_eq!(c.fallback(10.0, 0.030), MarketRegime::Volatile);
        assert_eq!(c.fallback(22.0, 0.015), MarketRegime::Trend);
    }

    #[test]
    fn test_component_shapes() {
        let c = classifier();
        assert_eq!(c.squeeze_component(0.010), 1.0);
        assert_relative_eq!(c.squeeze_component(0.016), 0.5, epsilon = 1e-9);
        assert_eq!(c.squeeze_component(0.025), 0.0);
        assert_relative_eq!(c.wide_component(0.016), 0.5, epsilon = 1e-9);
        assert_eq!(c.mid_adx_component(25.0), 1.0);
        assert_eq!(c.mid_adx_component(40.0), 0.0);
    }
}
