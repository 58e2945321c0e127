//! Session Rules Engine
//!
//! Session-aware filters and confidence adjustment for a validated
//! candidate. Filters are pure: the same candidate, context, features and
//! symbol always yield the same result and reason list.

use serde::{Deserialize, Serialize};

use super::session::session_duration;
use super::session_profiles::{resolve_profile, SessionProfile};
use crate::config::StrategyMap;
use crate::domain::{
    FeatureSnapshot, FrameView, Indicator, SessionContext, StrategyFamily, TradeCandidate,
    TradingSession,
};
use crate::validation::ValidatorConfig;

/// Strength below which confidence is scaled down
const WEAK_SESSION_STRENGTH: f64 = 0.7;

/// Maximum penalty for a session at zero strength
const WEAK_SESSION_MAX_PENALTY: f64 = 14.0;

const LONDON_BOS_BONUS: f64 = 10.0;
const NY_WIDE_SPREAD_PCT: f64 = 30.0;
const NY_WIDE_SPREAD_PENALTY: f64 = 10.0;
const ASIA_WICK_REJECTION_BONUS: f64 = 10.0;
const EQUAL_HIGHS_LOWS_BONUS: f64 = 5.0;
const SWEEP_REVERSAL_BONUS: f64 = 8.0;

/// Conditions under which a discouraged strategy may still trade.
/// Volume gates are shared with the validator's session-structure rules.
#[derive(Debug, Clone, Copy)]
struct ExceptionalOverride {
    session: TradingSession,
    family: StrategyFamily,
    volume_gate: fn(&ValidatorConfig) -> f64,
    required: Indicator,
}

fn asia_breakout_gate(cfg: &ValidatorConfig) -> f64 {
    cfg.asia_breakout_volume_z
}

fn asia_trend_gate(cfg: &ValidatorConfig) -> f64 {
    cfg.asia_trend_volume_z
}

const EXCEPTIONAL_OVERRIDES: &[ExceptionalOverride] = &[
    ExceptionalOverride {
        session: TradingSession::Asia,
        family: StrategyFamily::Breakout,
        volume_gate: asia_breakout_gate,
        required: Indicator::ChannelBreach,
    },
    ExceptionalOverride {
        session: TradingSession::Asia,
        family: StrategyFamily::Trend,
        volume_gate: asia_trend_gate,
        required: Indicator::Bos,
    },
];

impl ExceptionalOverride {
    fn holds(&self, frame: &FrameView<'_>, cfg: &ValidatorConfig) -> bool {
        frame.volume_z() >= (self.volume_gate)(cfg) && frame.flag(self.required)
    }

    fn describe(&self, cfg: &ValidatorConfig) -> String {
        format!("volume_z >= {:.1} and {}", (self.volume_gate)(cfg), self.required.key())
    }
}

/// Outcome of the session filters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub passed: bool,
    /// Every failing reason, in filter order
    pub reasons: Vec<String>,
}

impl FilterResult {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            passed: reasons.is_empty(),
            reasons,
        }
    }
}

/// Confidence adjustment with its components for analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAdjustment {
    pub original: f64,
    pub adjusted: f64,
    /// Named contributions, in the order applied
    pub components: Vec<(String, f64)>,
}

impl ConfidenceAdjustment {
    /// Net change after clamping
    pub fn delta(&self) -> f64 {
        self.adjusted - self.original
    }
}

/// Session filters and confidence adjustment over a strategy map snapshot
#[derive(Debug, Clone, Copy)]
pub struct SessionRulesEngine<'a> {
    map: &'a StrategyMap,
    /// Family used when the candidate's own strategy name matches none
    fallback_family: Option<StrategyFamily>,
}

impl<'a> SessionRulesEngine<'a> {
    pub fn new(map: &'a StrategyMap) -> Self {
        Self {
            map,
            fallback_family: None,
        }
    }

    /// Fall back to the selected template's strategy family
    pub fn with_template_strategy(mut self, strategy: &str) -> Self {
        self.fallback_family = StrategyFamily::from_name(strategy);
        self
    }

    /// Candidate family, else the template's
    pub fn family_of(&self, candidate: &TradeCandidate) -> Option<StrategyFamily> {
        candidate.family().or(self.fallback_family)
    }

    pub fn resolve_profile(&self, ctx: &SessionContext) -> SessionProfile {
        resolve_profile(ctx, self.map)
    }

    /// Run timing, indicator and strategy-fit filters; all reasons are collected
    pub fn apply_filters(
        &self,
        candidate: &TradeCandidate,
        ctx: &SessionContext,
        features: &FeatureSnapshot,
        symbol: &str,
    ) -> FilterResult {
        let profile = self.resolve_profile(ctx);
        let frame = features.primary();
        let family = self.family_of(candidate);
        let thresholds: ValidatorConfig = self.map.resolve("validation", symbol, ctx.session);
        let mut reasons = Vec::new();

        self.timing_filter(&profile, ctx, &mut reasons);
        self.indicator_filter(&profile, ctx, family, &frame, &mut reasons);
        self.strategy_fit_filter(&profile, ctx, candidate, family, &frame, &thresholds, &mut reasons);

        let result = FilterResult::from_reasons(reasons);
        if !result.passed {
            tracing::debug!(
                "{} {} blocked by {} session filters: {:?}",
                symbol,
                candidate.strategy,
                ctx.tag(),
                result.reasons
            );
        }
        result
    }

    fn timing_filter(&self, profile: &SessionProfile, ctx: &SessionContext, reasons: &mut Vec<String>) {
        if ctx.session == TradingSession::Unknown {
            return;
        }
        let minutes = ctx.minutes_into_session;
        if minutes < profile.avoid_first_minutes {
            reasons.push(format!(
                "too early in {} session: {} min in, avoid first {} min",
                ctx.session, minutes, profile.avoid_first_minutes
            ));
        }
        let duration = if profile.session_duration_minutes > 0 {
            profile.session_duration_minutes
        } else {
            session_duration(ctx.session)
        };
        if duration > 0
            && profile.avoid_last_minutes > 0
            && minutes >= duration.saturating_sub(profile.avoid_last_minutes)
        {
            reasons.push(format!(
                "too late in {} session: {} of {} min, avoid last {} min",
                ctx.session, minutes, duration, profile.avoid_last_minutes
            ));
        }
    }

    fn indicator_filter(
        &self,
        profile: &SessionProfile,
        ctx: &SessionContext,
        family: Option<StrategyFamily>,
        frame: &FrameView<'_>,
        reasons: &mut Vec<String>,
    ) {
        let adx = frame.adx();
        if family != Some(StrategyFamily::Range) && adx < profile.min_adx {
            reasons.push(format!(
                "ADX {:.1} below {} minimum {:.1}",
                adx, ctx.session, profile.min_adx
            ));
        }

        let volume_z = frame.volume_z();
        if volume_z < profile.min_volume_z {
            reasons.push(format!(
                "volume z-score {:.2} below {} minimum {:.2}",
                volume_z, ctx.session, profile.min_volume_z
            ));
        }

        let spread = frame.spread_atr_pct();
        if spread > profile.max_spread_atr_pct {
            reasons.push(format!(
                "spread {:.1}% ATR above {} ceiling {:.1}%",
                spread, ctx.session, profile.max_spread_atr_pct
            ));
        }

        let bb_width = frame.bb_width();
        if bb_width < profile.min_bb_width {
            reasons.push(format!(
                "band width {:.4} below {} minimum {:.4}",
                bb_width, ctx.session, profile.min_bb_width
            ));
        }

        match family {
            Some(StrategyFamily::Trend) if profile.require_bos_for_trend && !frame.bos() => {
                reasons.push(format!("{} trend entry requires a break of structure", ctx.session));
            }
            Some(StrategyFamily::Breakout)
                if profile.require_volume_for_breakout && volume_z < profile.volume_confirmation_z =>
            {
                reasons.push(format!(
                    "breakout needs volume confirmation: z {:.2} < {:.2}",
                    volume_z, profile.volume_confirmation_z
                ));
            }
            _ => {}
        }
    }

    fn strategy_fit_filter(
        &self,
        profile: &SessionProfile,
        ctx: &SessionContext,
        candidate: &TradeCandidate,
        family: Option<StrategyFamily>,
        frame: &FrameView<'_>,
        thresholds: &ValidatorConfig,
        reasons: &mut Vec<String>,
    ) {
        let discouraged = profile.is_discouraged(&candidate.strategy)
            || family.is_some_and(|f| profile.is_discouraged(f.as_str()));
        if discouraged {
            let exception = family.and_then(|f| {
                EXCEPTIONAL_OVERRIDES
                    .iter()
                    .find(|o| o.session == ctx.session && o.family == f)
            });
            match exception {
                Some(o) if o.holds(frame, thresholds) => {
                    tracing::debug!(
                        "{} allowed in {} under exceptional conditions",
                        candidate.strategy,
                        ctx.session
                    );
                }
                Some(o) => reasons.push(format!(
                    "{} discouraged in {} session without exceptional conditions ({})",
                    candidate.strategy,
                    ctx.session,
                    o.describe(thresholds)
                )),
                None => reasons.push(format!(
                    "{} discouraged in {} session",
                    candidate.strategy, ctx.session
                )),
            }
        }

        if profile.discourage_mid_range && family == Some(StrategyFamily::Trend) {
            if let Some(pos) = frame.range_position() {
                if pos > profile.mid_range_low && pos < profile.mid_range_high {
                    reasons.push(format!(
                        "trend entry from mid-range (position {:.2}) blocked in {}",
                        pos, ctx.session
                    ));
                }
            }
        }
    }

    /// Session-aware confidence adjustment, clamped to [0,100]
    pub fn adjust_confidence(
        &self,
        candidate: &TradeCandidate,
        ctx: &SessionContext,
        features: &FeatureSnapshot,
        symbol: &str,
    ) -> ConfidenceAdjustment {
        let profile = self.resolve_profile(ctx);
        let frame = features.primary();
        let family = self.family_of(candidate);
        let original = candidate.overall_confidence();
        let mut components = Vec::new();

        let strategy_delta = profile.strategy_delta(&candidate.strategy);
        let scaled = (profile.base_confidence_delta + strategy_delta) * profile.symbol_multiplier(symbol);
        components.push(("profile".to_string(), scaled));

        if family == Some(StrategyFamily::Trend) && ctx.is_london_family() && frame.bos() {
            components.push(("london_bos".to_string(), LONDON_BOS_BONUS));
        }
        if ctx.session == TradingSession::NewYork && frame.spread_atr_pct() > NY_WIDE_SPREAD_PCT {
            components.push(("ny_wide_spread".to_string(), -NY_WIDE_SPREAD_PENALTY));
        }
        if ctx.session == TradingSession::Asia
            && family == Some(StrategyFamily::Range)
            && frame.wick_rejection()
        {
            components.push(("asia_wick_rejection".to_string(), ASIA_WICK_REJECTION_BONUS));
        }
        if ctx.session_strength < WEAK_SESSION_STRENGTH {
            let penalty = WEAK_SESSION_MAX_PENALTY * (WEAK_SESSION_STRENGTH - ctx.session_strength)
                / WEAK_SESSION_STRENGTH;
            components.push(("weak_session".to_string(), -penalty));
        }
        if frame.equal_highs_lows() {
            components.push(("equal_highs_lows".to_string(), EQUAL_HIGHS_LOWS_BONUS));
        }
        if frame.sweep_reversal() {
            components.push(("sweep_reversal".to_string(), SWEEP_REVERSAL_BONUS));
        }

        let total: f64 = components.iter().map(|(_, v)| v).sum();
        let adjusted = (original + total).clamp(0.0, 100.0);

        ConfidenceAdjustment {
            original,
            adjusted,
            components,
        }
    }
}
