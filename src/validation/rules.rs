//! Business Rules Phase
//!
//! Template, strategy-family, geometry, cost, guardrail and session-structure
//! checks on a schema-valid candidate. Every failing rule is reported.

use super::config::ValidatorConfig;
use crate::domain::{
    Direction, FeatureSnapshot, FrameView, OrderType, SessionContext, StrategyFamily,
    TradeCandidate, TradingSession,
};
use crate::templates::StrategyTemplate;

/// Tolerance on the inclusive stop-distance boundary
const STOP_DISTANCE_EPSILON: f64 = 1e-9;

/// Errors and warnings from one rules pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleFindings {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RuleFindings {
    fn error(&mut self, msg: String) {
        self.errors.push(msg);
    }

    fn warn(&mut self, msg: String) {
        self.warnings.push(msg);
    }
}

/// Inputs shared by every business rule
pub struct RuleContext<'a> {
    pub template: &'a StrategyTemplate,
    pub features: &'a FeatureSnapshot,
    pub session: &'a SessionContext,
    pub config: &'a ValidatorConfig,
}

impl<'a> RuleContext<'a> {
    fn frame(&self) -> FrameView<'a> {
        self.features.primary()
    }

    /// Candidate family, else the template's
    pub fn family(&self, candidate: &TradeCandidate) -> Option<StrategyFamily> {
        candidate
            .family()
            .or_else(|| StrategyFamily::from_name(&self.template.strategy))
    }
}

/// Run all business rules
pub fn check_business(candidate: &TradeCandidate, ctx: &RuleContext<'_>) -> RuleFindings {
    let mut findings = RuleFindings::default();

    if candidate.order_type.is_skip() {
        check_skip_levels(candidate, &mut findings);
        return findings;
    }

    check_template_fit(candidate, ctx, &mut findings);
    check_family(candidate, ctx, &mut findings);
    check_confirmations(ctx, &mut findings);
    check_geometry(candidate, ctx, &mut findings);
    check_costs(candidate, ctx, &mut findings);
    check_guardrails(ctx, &mut findings);
    check_session_structure(candidate, ctx, &mut findings);
    check_recomputed_rr(candidate, ctx, &mut findings);

    findings
}

/// Skip candidates that still carry levels must describe a coherent trade
fn check_skip_levels(candidate: &TradeCandidate, findings: &mut RuleFindings) {
    let Some((entry, stop, target)) = candidate.levels() else {
        return;
    };
    let sane = if stop < entry {
        target > entry
    } else if stop > entry {
        target < entry
    } else {
        false
    };
    if !sane {
        findings.error(format!(
            "skip candidate levels are inconsistent: entry {} stop {} target {}",
            entry, stop, target
        ));
    }
}

fn check_template_fit(candidate: &TradeCandidate, ctx: &RuleContext<'_>, findings: &mut RuleFindings) {
    let t = ctx.template;
    if !t.allows(candidate.order_type) {
        findings.error(format!(
            "order type {} not allowed by template {}",
            candidate.order_type, t.id
        ));
    }
    if let Some(rr) = candidate.risk_reward {
        if rr < t.min_rr {
            findings.error(format!("RR too low: {:.2} < template min {:.2}", rr, t.min_rr));
        } else if rr > t.max_rr {
            findings.error(format!("RR too high: {:.2} > template max {:.2}", rr, t.max_rr));
        }
    }
}

fn check_family(candidate: &TradeCandidate, ctx: &RuleContext<'_>, findings: &mut RuleFindings) {
    let Some(family) = ctx.family(candidate) else {
        findings.warn(format!(
            "strategy '{}' matches no known family, family rules skipped",
            candidate.strategy
        ));
        return;
    };

    let order_type = candidate.order_type;
    if !family.legal_order_types().contains(&order_type) {
        let kind = if family == StrategyFamily::Range { "limit" } else { "stop" };
        findings.error(format!(
            "{} strategy requires {} orders, got {}",
            family, kind, order_type
        ));
    }

    let rules = &ctx.template.rules;
    let adx = ctx.frame().adx();
    match family {
        StrategyFamily::Trend => {
            let min = rules.min_trend_agreement.unwrap_or(ctx.config.trend_min_agreement);
            match ctx.features.trend_agreement() {
                Some(agreement) if agreement < min => findings.error(format!(
                    "trend agreement {:.2} below minimum {:.2}",
                    agreement, min
                )),
                Some(_) => {}
                None => findings.warn("cross-timeframe trend agreement unavailable".to_string()),
            }
            if let Some(min_adx) = rules.min_adx {
                if adx < min_adx {
                    findings.error(format!("ADX {:.1} below template minimum {:.1}", adx, min_adx));
                }
            }
        }
        StrategyFamily::Range => {
            let ceiling = rules.max_adx.unwrap_or(ctx.config.range_max_adx);
            if adx >= ceiling {
                findings.error(format!(
                    "ADX {:.1} too high for range fade (max {:.1})",
                    adx, ceiling
                ));
            }
        }
        StrategyFamily::Breakout => {
            let floor = rules.min_adx.unwrap_or(ctx.config.breakout_min_adx);
            if adx <= floor {
                findings.error(format!(
                    "ADX {:.1} too low for breakout (min {:.1})",
                    adx, floor
                ));
            }
        }
    }
}

fn check_confirmations(ctx: &RuleContext<'_>, findings: &mut RuleFindings) {
    let frame = ctx.frame();
    for name in &ctx.template.rules.required_confirmations {
        if !frame.flag_named(name) {
            findings.error(format!("required confirmation '{}' not present", name));
        }
    }
}

fn check_geometry(candidate: &TradeCandidate, ctx: &RuleContext<'_>, findings: &mut RuleFindings) {
    let Some((entry, stop, target)) = candidate.levels() else {
        return;
    };
    let Some(direction) = candidate.order_type.direction() else {
        return;
    };

    let ordered = match direction {
        Direction::Long => stop < entry && entry < target,
        Direction::Short => target < entry && entry < stop,
    };
    if !ordered {
        let rule = match direction {
            Direction::Long => "stop < entry < target",
            Direction::Short => "target < entry < stop",
        };
        findings.error(format!(
            "levels not ordered for {:?}: need {} (entry {} stop {} target {})",
            direction, rule, entry, stop, target
        ));
    }

    let price = ctx.features.price;
    if price > 0.0 {
        match candidate.order_type {
            OrderType::BuyStop if entry <= price => findings.error(format!(
                "buy_stop entry {} must be above current price {}",
                entry, price
            )),
            OrderType::SellStop if entry >= price => findings.error(format!(
                "sell_stop entry {} must be below current price {}",
                entry, price
            )),
            OrderType::BuyLimit if entry >= price => findings.error(format!(
                "buy_limit entry {} must be below current price {}",
                entry, price
            )),
            OrderType::SellLimit if entry <= price => findings.error(format!(
                "sell_limit entry {} must be above current price {}",
                entry, price
            )),
            _ => {}
        }
    } else {
        findings.warn("current price unavailable, entry side unchecked".to_string());
    }

    let frame = ctx.frame();
    let atr = frame.atr();
    if atr <= 0.0 {
        findings.warn("ATR unavailable, stop distance unchecked".to_string());
        return;
    }

    let distance = (entry - stop).abs();
    let min_distance = ctx.config.min_stop_atr * atr;
    if distance + STOP_DISTANCE_EPSILON < min_distance {
        findings.error(format!(
            "stop distance {:.5} below {:.2}x ATR ({:.5})",
            distance, ctx.config.min_stop_atr, min_distance
        ));
    }

    let buffer = ctx.config.swing_buffer_atr * atr;
    match direction {
        Direction::Long => {
            if let Some(swing_low) = frame.swing_low() {
                if stop > swing_low - buffer + STOP_DISTANCE_EPSILON {
                    findings.error(format!(
                        "stop {} not beyond swing low {} by {:.2}x ATR",
                        stop, swing_low, ctx.config.swing_buffer_atr
                    ));
                }
            }
        }
        Direction::Short => {
            if let Some(swing_high) = frame.swing_high() {
                if stop < swing_high + buffer - STOP_DISTANCE_EPSILON {
                    findings.error(format!(
                        "stop {} not beyond swing high {} by {:.2}x ATR",
                        stop, swing_high, ctx.config.swing_buffer_atr
                    ));
                }
            }
        }
    }
}

fn check_costs(candidate: &TradeCandidate, ctx: &RuleContext<'_>, findings: &mut RuleFindings) {
    let frame = ctx.frame();
    let rr = candidate.computed_risk_reward().or(candidate.risk_reward);
    if let Some(rr) = rr.filter(|r| *r > 0.0) {
        let cost_r = (frame.spread_atr_pct() + frame.slippage_atr_pct()) / 100.0;
        let erosion = cost_r / rr;
        if erosion > ctx.config.max_cost_erosion {
            findings.error(format!(
                "execution costs erode {:.0}% of planned RR (max {:.0}%)",
                erosion * 100.0,
                ctx.config.max_cost_erosion * 100.0
            ));
        }
    }

    if frame
        .execution_quality()
        .is_some_and(|q| q.trim().eq_ignore_ascii_case("poor"))
    {
        findings.error("execution quality is poor".to_string());
    }
}

fn check_guardrails(ctx: &RuleContext<'_>, findings: &mut RuleFindings) {
    let frame = ctx.frame();
    if frame.news_blackout() {
        findings.error("news blackout active".to_string());
    }
    if frame.exposure_limit_hit() {
        findings.error("exposure limit reached".to_string());
    }
    if let Some(limit) = frame.spread_limit() {
        let spread = frame.spread_atr_pct();
        if spread > limit {
            findings.error(format!(
                "spread {:.1}% ATR above guardrail limit {:.1}%",
                spread, limit
            ));
        }
    }
}

fn check_session_structure(candidate: &TradeCandidate, ctx: &RuleContext<'_>, findings: &mut RuleFindings) {
    let Some(family) = ctx.family(candidate) else {
        return;
    };
    let frame = ctx.frame();
    let cfg = ctx.config;
    let session = ctx.session.session;

    if family == StrategyFamily::Range {
        if let Some(min_width) = cfg.range_min_bb_width_for(session.as_str()) {
            let width = frame.bb_width();
            if width < min_width {
                findings.error(format!(
                    "range too narrow for {} session: band width {:.4} < {:.4}",
                    session, width, min_width
                ));
            }
        }
    }

    if session.is_major() && family != StrategyFamily::Breakout {
        match frame.range_position() {
            Some(pos) if pos > cfg.mid_range_low && pos < cfg.mid_range_high => {
                findings.error(format!(
                    "mid-range entry (position {:.2}) blocked in {}",
                    pos, session
                ));
            }
            Some(_) => {}
            None => findings.warn("range position unavailable".to_string()),
        }
    }

    let volume_z = frame.volume_z();
    match (session, family) {
        (TradingSession::Asia, StrategyFamily::Breakout) => {
            if volume_z < cfg.asia_breakout_volume_z || !frame.channel_breach() {
                findings.error(format!(
                    "ASIA breakout needs volume_z >= {:.1} and a channel breach (volume_z {:.2})",
                    cfg.asia_breakout_volume_z, volume_z
                ));
            }
        }
        (TradingSession::Asia, StrategyFamily::Trend) => {
            if volume_z < cfg.asia_trend_volume_z || !frame.bos() {
                findings.error(format!(
                    "ASIA trend needs volume_z >= {:.1} and a break of structure (volume_z {:.2})",
                    cfg.asia_trend_volume_z, volume_z
                ));
            }
        }
        (TradingSession::NewYork, StrategyFamily::Trend) => {
            if !frame.bos() {
                findings.error("NY trend entry needs a break of structure".to_string());
            }
        }
        _ => {}
    }
}

fn check_recomputed_rr(candidate: &TradeCandidate, ctx: &RuleContext<'_>, findings: &mut RuleFindings) {
    let Some(computed) = candidate.computed_risk_reward() else {
        return;
    };
    if computed < ctx.template.min_rr {
        findings.error(format!(
            "recomputed RR too low: {:.2} < template min {:.2}",
            computed, ctx.template.min_rr
        ));
    }
    if let Some(reported) = candidate.risk_reward {
        let gap = (reported - computed).abs() / computed;
        if gap > ctx.config.rr_mismatch_warning {
            findings.warn(format!(
                "reported RR {:.2} differs from recomputed {:.2} by {:.0}%",
                reported,
                computed,
                gap * 100.0
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketRegime, Timeframe};
    use crate::templates::TemplateRules;
    use std::collections::BTreeMap;

    fn template(strategy: &str, min_rr: f64, order_types: Vec<OrderType>) -> StrategyTemplate {
        StrategyTemplate {
            id: format!("{}_test", strategy),
            version: "1.0".to_string(),
            strategy: strategy.to_string(),
            regime: MarketRegime::Trend,
            order_types,
            min_rr,
            max_rr: 5.0,
            body: "{{FEATURES_JSON}} RR ≥ 1.8".to_string(),
            rules: TemplateRules::default(),
        }
    }

    fn candidate(strategy: &str, order_type: OrderType, levels: (f64, f64, f64), rr: f64) -> TradeCandidate {
        TradeCandidate {
            strategy: strategy.to_string(),
            order_type,
            entry: Some(levels.0),
            stop: Some(levels.1),
            target: Some(levels.2),
            risk_reward: Some(rr),
            confidence: BTreeMap::new(),
            rationale: "test".to_string(),
            tags: vec![],
            template_version: None,
        }
    }

    fn london() -> SessionContext {
        SessionContext {
            session: TradingSession::London,
            is_market_open: true,
            ..Default::default()
        }
    }

    /// London trend snapshot that passes every rule for a 102.5/100/107.5 buy_stop
    fn trend_features() -> FeatureSnapshot {
        FeatureSnapshot::new("US500", 102.0)
            .with_value(Timeframe::M15, "adx", 32.0)
            .with_value(Timeframe::M15, "atr", 5.0)
            .with_value(Timeframe::M15, "bos", true)
            .with_value(Timeframe::M15, "range_position", 0.8)
            .with_trend_agreement(0.8)
    }

    fn run(c: &TradeCandidate, t: &StrategyTemplate, f: &FeatureSnapshot, s: &SessionContext) -> RuleFindings {
        let config = ValidatorConfig::default();
        check_business(
            c,
            &RuleContext {
                template: t,
                features: f,
                session: s,
                config: &config,
            },
        )
    }

    fn trend_stops() -> Vec<OrderType> {
        vec![OrderType::BuyStop, OrderType::SellStop]
    }

    #[test]
    fn test_rr_two_against_template_minimums() {
        let c = candidate("trend_pullback", OrderType::BuyStop, (102.5, 100.0, 107.5), 2.0);
        let ok = run(&c, &template("trend_pullback", 1.8, trend_stops()), &trend_features(), &london());
        assert!(ok.errors.is_empty(), "{:?}", ok.errors);

        let strict = run(&c, &template("trend_pullback", 2.5, trend_stops()), &trend_features(), &london());
        assert!(strict.errors.iter().any(|e| e.starts_with("RR too low")));
    }

    #[test]
    fn test_buy_stop_at_or_below_price_invalid() {
        let t = template("trend_pullback", 1.8, trend_stops());
        for price in [102.5, 103.0] {
            let mut f = trend_features();
            f.price = price;
            let c = candidate("trend_pullback", OrderType::BuyStop, (102.5, 100.0, 107.5), 2.0);
            let findings = run(&c, &t, &f, &london());
            assert!(findings.errors.iter().any(|e| e.contains("must be above current price")));
        }
    }

    #[test]
    fn test_stop_distance_boundary_inclusive() {
        let t = template("trend_pullback", 1.8, trend_stops());
        // ATR 2.5 -> minimum distance 1.0
        let f = trend_features().with_value(Timeframe::M15, "atr", 2.5);
        let at_boundary = candidate("trend_pullback", OrderType::BuyStop, (103.0, 102.0, 105.0), 2.0);
        assert!(run(&at_boundary, &t, &f, &london()).errors.is_empty());

        let inside = candidate("trend_pullback", OrderType::BuyStop, (103.0, 102.1, 104.8), 2.0);
        let findings = run(&inside, &t, &f, &london());
        assert!(findings.errors.iter().any(|e| e.contains("stop distance")), "{:?}", findings.errors);
    }

    #[test]
    fn test_recomputed_rr_below_minimum() {
        let t = template("trend_pullback", 1.8, trend_stops());
        // reports 2.0 but the levels only give 1.5
        let c = candidate("trend_pullback", OrderType::BuyStop, (102.5, 100.0, 106.25), 2.0);
        let findings = run(&c, &t, &trend_features(), &london());
        assert!(findings.errors.iter().any(|e| e.starts_with("recomputed RR too low")));
        assert!(findings.warnings.iter().any(|w| w.contains("differs from recomputed")));
    }

    #[test]
    fn test_order_type_not_in_template() {
        let t = template("trend_pullback", 1.8, vec![OrderType::SellStop]);
        let c = candidate("trend_pullback", OrderType::BuyStop, (102.5, 100.0, 107.5), 2.0);
        let findings = run(&c, &t, &trend_features(), &london());
        assert!(findings.errors.iter().any(|e| e.contains("not allowed by template")));
    }

    #[test]
    fn test_london_range_too_narrow() {
        let t = template("range_fade", 1.5, vec![OrderType::BuyLimit, OrderType::SellLimit]);
        let f = FeatureSnapshot::new("EURUSD", 1.1000)
            .with_value(Timeframe::M15, "adx", 18.0)
            .with_value(Timeframe::M15, "atr", 0.0020)
            .with_value(Timeframe::M15, "bb_width", 0.025)
            .with_value(Timeframe::M15, "range_position", 0.1);
        let c = candidate("range_fade", OrderType::BuyLimit, (1.0990, 1.0980, 1.1010), 2.0);
        let findings = run(&c, &t, &f, &london());
        assert!(
            findings.errors.iter().any(|e| e.contains("range too narrow for LONDON")),
            "{:?}",
            findings.errors
        );
    }

    #[test]
    fn test_session_structure_uses_template_family_for_unknown_names() {
        let t = template("range_fade", 1.5, vec![OrderType::BuyLimit, OrderType::SellLimit]);
        let f = FeatureSnapshot::new("EURUSD", 1.1000)
            .with_value(Timeframe::M15, "adx", 18.0)
            .with_value(Timeframe::M15, "atr", 0.0020)
            .with_value(Timeframe::M15, "bb_width", 0.025)
            .with_value(Timeframe::M15, "range_position", 0.5);
        for strategy in ["range_fade", "lower_band_bounce"] {
            let c = candidate(strategy, OrderType::BuyLimit, (1.0990, 1.0980, 1.1010), 2.0);
            let findings = run(&c, &t, &f, &london());
            assert!(
                findings.errors.iter().any(|e| e.contains("range too narrow for LONDON")),
                "{}: {:?}",
                strategy,
                findings.errors
            );
            assert!(findings.errors.iter().any(|e| e.starts_with("mid-range entry")), "{}", strategy);
        }
    }

    #[test]
    fn test_family_order_type_and_adx() {
        let t = template("breakout", 1.8, vec![OrderType::BuyStop, OrderType::BuyLimit]);
        let f = trend_features().with_value(Timeframe::M15, "adx", 15.0);
        let c = candidate("breakout", OrderType::BuyLimit, (101.5, 99.0, 106.5), 2.0);
        let findings = run(&c, &t, &f, &london());
        assert!(findings.errors.iter().any(|e| e.contains("requires stop orders")));
        assert!(findings.errors.iter().any(|e| e.contains("too low for breakout")));
    }

    #[test]
    fn test_cost_erosion_and_guardrails() {
        let t = template("trend_pullback", 1.8, trend_stops());
        let f = trend_features()
            .with_value(Timeframe::M15, "spread_atr_pct", 30.0)
            .with_value(Timeframe::M15, "slippage_atr_pct", 15.0)
            .with_value(Timeframe::M15, "news_blackout", true)
            .with_value(Timeframe::M15, "spread_limit", 20.0)
            .with_value(Timeframe::M15, "execution_quality", "POOR");
        let c = candidate("trend_pullback", OrderType::BuyStop, (102.5, 100.0, 107.5), 2.0);
        let findings = run(&c, &t, &f, &london());
        for needle in ["erode", "poor", "news blackout", "guardrail limit"] {
            assert!(findings.errors.iter().any(|e| e.contains(needle)), "missing {}", needle);
        }
    }

    #[test]
    fn test_skip_levels_sanity() {
        let t = template("trend_pullback", 1.8, trend_stops());
        let sane = candidate("trend_pullback", OrderType::Skip, (102.5, 100.0, 107.5), 2.0);
        assert!(run(&sane, &t, &trend_features(), &london()).errors.is_empty());
        let broken = candidate("trend_pullback", OrderType::Skip, (102.5, 100.0, 101.0), 2.0);
        assert_eq!(run(&broken, &t, &trend_features(), &london()).errors.len(), 1);
    }

    #[test]
    fn test_asia_and_ny_structure_rules() {
        let t = template("trend_pullback", 1.8, trend_stops());
        let c = candidate("trend_pullback", OrderType::BuyStop, (102.5, 100.0, 107.5), 2.0);
        let mut asia = london();
        asia.session = TradingSession::Asia;
        let findings = run(&c, &t, &trend_features(), &asia);
        assert!(findings.errors.iter().any(|e| e.contains("ASIA trend needs")));

        let mut ny = london();
        ny.session = TradingSession::NewYork;
        let no_bos = trend_features().with_value(Timeframe::M15, "bos", false);
        let findings = run(&c, &t, &no_bos, &ny);
        assert!(findings.errors.iter().any(|e| e.contains("NY trend entry")));
    }

    #[test]
    fn test_swing_clearance() {
        let t = template("trend_pullback", 1.8, trend_stops());
        // ATR 5 -> buffer 0.5; stop 100.0 needs swing low >= 100.5
        let close_swing = trend_features().with_value(Timeframe::M15, "swing_low", 100.2);
        let c = candidate("trend_pullback", OrderType::BuyStop, (102.5, 100.0, 107.5), 2.0);
        assert!(run(&c, &t, &close_swing, &london()).errors.iter().any(|e| e.contains("swing low")));

        let clear_swing = trend_features().with_value(Timeframe::M15, "swing_low", 100.6);
        assert!(run(&c, &t, &clear_swing, &london()).errors.is_empty());
    }
}
