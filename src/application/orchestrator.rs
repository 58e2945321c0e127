//! Decision Orchestrator
//!
//! Runs one snapshot through the whole pipeline: session detection, regime
//! classification, template selection and health check, the reasoning
//! call, validation with auto-repair, session filters and confidence
//! adjustment. Every failure resolves to a well-formed skip outcome.

use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{StrategyMap, StrategyMapStore};
use crate::domain::{
    DecisionOutcome, DecisionStatus, FeatureSnapshot, Guardrails, MarketRegime, RegimeScores,
    SessionContext, TradeCandidate,
};
use crate::ports::reasoning::{ProposalRequest, ReasoningPort};
use crate::strategy::regime::{RegimeClassification, RegimeClassifier, RegimeConfig, RegimeInput};
use crate::strategy::session::detect_session;
use crate::strategy::session_rules::SessionRulesEngine;
use crate::templates::{
    SelectionPolicy, StrategyTemplate, TemplateCatalog, TemplateSelection, UNKNOWN_REGIME_REASON,
};
use crate::validation::{ResponseValidator, ValidatorConfig};

/// Evaluation instant: the request's, else the snapshot timestamp, else the wall clock
fn evaluation_instant(request: &DecisionRequest) -> DateTime<Utc> {
    request
        .now
        .or_else(|| request.snapshot.parsed_timestamp())
        .unwrap_or_else(Utc::now)
}

/// One invocation's input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub snapshot: FeatureSnapshot,
    #[serde(default)]
    pub guardrails: Guardrails,
    /// Label from the caller's previous invocation, for hysteresis
    #[serde(default)]
    pub prev_regime: Option<MarketRegime>,
    /// Scores from the previous invocation, for smoothing
    #[serde(default)]
    pub prev_scores: Option<RegimeScores>,
    /// Evaluation instant; defaults to the snapshot timestamp, then the wall clock
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

impl DecisionRequest {
    pub fn new(snapshot: FeatureSnapshot) -> Self {
        Self {
            snapshot,
            ..Default::default()
        }
    }

    pub fn with_guardrails(mut self, guardrails: Guardrails) -> Self {
        self.guardrails = guardrails;
        self
    }

    pub fn with_previous(mut self, regime: Option<MarketRegime>, scores: Option<RegimeScores>) -> Self {
        self.prev_regime = regime;
        self.prev_scores = scores;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

/// Context shared by every exit of one invocation
struct Draft {
    symbol: String,
    regime: MarketRegime,
    scores: RegimeScores,
    session: SessionContext,
    timestamp: DateTime<Utc>,
    template: Option<Arc<StrategyTemplate>>,
    tags: Vec<String>,
}

impl Draft {
    fn new(symbol: &str, session: SessionContext, classification: &RegimeClassification, timestamp: DateTime<Utc>) -> Self {
        let tags = vec![
            format!("session={}", session.session),
            format!("regime={}", classification.regime),
            format!(
                "overlap={}",
                session.overlap.map(|o| o.as_str()).unwrap_or("none")
            ),
            format!("transition={}", session.is_transition_period),
            format!("symbol={}", symbol),
        ];
        Self {
            symbol: symbol.to_string(),
            regime: classification.regime,
            scores: classification.scores,
            session,
            timestamp,
            template: None,
            tags,
        }
    }

    fn set_template(&mut self, template: Arc<StrategyTemplate>) {
        self.tags.push(format!("template={}", template.id));
        self.template = Some(template);
    }

    fn finish(
        self,
        status: DecisionStatus,
        candidate: Option<TradeCandidate>,
        skip_reasons: Vec<String>,
        validation_score: Option<f64>,
    ) -> DecisionOutcome {
        DecisionOutcome {
            status,
            symbol: self.symbol,
            candidate,
            skip_reasons,
            template_id: self.template.as_ref().map(|t| t.id.clone()),
            template_version: self.template.as_ref().map(|t| t.version.clone()),
            regime: self.regime,
            regime_scores: self.scores,
            session_tag: self.session.tag(),
            session: self.session,
            validation_score,
            timestamp: self.timestamp,
            tags: self.tags,
        }
    }

    fn skip(self, reasons: Vec<String>) -> DecisionOutcome {
        tracing::info!("{} SKIP: {}", self.symbol, reasons.join("; "));
        self.finish(DecisionStatus::Skip, None, reasons, None)
    }
}

/// Composes the pipeline stages over injected catalogs and reasoning port
#[derive(Clone)]
pub struct DecisionOrchestrator {
    strategy_map: Arc<StrategyMapStore>,
    templates: Arc<TemplateCatalog>,
    reasoning: Arc<dyn ReasoningPort>,
    hot_reload: bool,
}

impl DecisionOrchestrator {
    pub fn new(
        strategy_map: Arc<StrategyMapStore>,
        templates: Arc<TemplateCatalog>,
        reasoning: Arc<dyn ReasoningPort>,
    ) -> Self {
        Self {
            strategy_map,
            templates,
            reasoning,
            hot_reload: false,
        }
    }

    /// Check catalog mtimes before every decision
    pub fn with_hot_reload(mut self, enabled: bool) -> Self {
        self.hot_reload = enabled;
        self
    }

    pub fn templates(&self) -> &TemplateCatalog {
        &self.templates
    }

    pub fn strategy_map(&self) -> &StrategyMapStore {
        &self.strategy_map
    }

    /// Pick up changed catalog files; failures keep the current snapshots
    pub fn refresh(&self) {
        if let Err(e) = self.strategy_map.reload_if_changed() {
            tracing::warn!("Strategy map reload failed, keeping current snapshot: {}", e);
        }
        if let Err(e) = self.templates.reload_if_changed() {
            tracing::warn!("Template catalog reload failed, keeping current snapshot: {}", e);
        }
    }

    /// Session and regime for a request, without selecting or calling anything
    pub fn classify(&self, request: &DecisionRequest) -> (SessionContext, RegimeClassification) {
        let map = self.strategy_map.current();
        self.classify_at(request, &map, evaluation_instant(request))
    }

    /// Classifies the caller's snapshot as given; guardrails are merged afterwards
    fn classify_at(
        &self,
        request: &DecisionRequest,
        map: &StrategyMap,
        now: DateTime<Utc>,
    ) -> (SessionContext, RegimeClassification) {
        let snapshot = &request.snapshot;
        let session = detect_session(now);
        let config: RegimeConfig = map.resolve("regime", &snapshot.symbol, session.session);
        let input = RegimeInput::new(snapshot, session.session)
            .with_previous(request.prev_regime, request.prev_scores);
        let classification = RegimeClassifier::new(config).classify(&input);
        (session, classification)
    }

    /// Produce one decision. Never fails: every problem becomes a skip.
    pub async fn decide(&self, request: &DecisionRequest) -> DecisionOutcome {
        if self.hot_reload {
            self.refresh();
        }

        let map = self.strategy_map.current();
        let timestamp = evaluation_instant(request);
        let (session, classification) = self.classify_at(request, &map, timestamp);
        let features = request.snapshot.with_guardrails(&request.guardrails);
        let symbol = features.symbol.clone();

        tracing::info!(
            "{} | session {} | regime {}",
            symbol,
            session.tag(),
            classification.summary()
        );

        let mut draft = Draft::new(&symbol, session.clone(), &classification, timestamp);

        let mut blocked = Vec::new();
        if classification.regime == MarketRegime::Unknown {
            blocked.push(UNKNOWN_REGIME_REASON.to_string());
        }
        if session.is_weekend {
            blocked.push("market closed: weekend".to_string());
        }
        if !blocked.is_empty() {
            return draft.skip(blocked);
        }

        // 1. template
        let policy: SelectionPolicy = map.resolve("selection", &symbol, session.session);
        let template = match self
            .templates
            .select_with(classification.regime, &session, &features, &policy)
        {
            TemplateSelection::Selected(template) => template,
            TemplateSelection::Skip(reason) => return draft.skip(vec![reason]),
        };
        draft.set_template(template.clone());

        let health = self.templates.health_check(&template);
        if !health.is_healthy() {
            tracing::warn!("Template {} failed health check: {:?}", template.id, health.issues);
            return draft.skip(health.issues);
        }

        // 2. reasoning
        let proposal = ProposalRequest {
            symbol: symbol.clone(),
            prompt: template.render(&features, &session, classification.regime),
            template_id: template.id.clone(),
            template_version: template.version.clone(),
            regime: classification.regime,
            session_tag: session.tag(),
        };
        let raw: Value = match self.reasoning.propose(&proposal).await {
            Ok(Some(value)) => value,
            Ok(None) => return draft.skip(vec!["reasoning service returned no candidate".to_string()]),
            Err(e) => {
                tracing::warn!("Reasoning call failed for {}: {}", symbol, e);
                return draft.skip(vec![format!("reasoning call failed: {}", e)]);
            }
        };

        // 3. validation
        let validator_config: ValidatorConfig = map.resolve("validation", &symbol, session.session);
        let validation = ResponseValidator::new(validator_config).validate(
            &raw,
            Some(template.as_ref()),
            &features,
            &session,
        );
        if !validation.valid {
            let mut reasons = validation.errors;
            reasons.extend(validation.warnings);
            return draft.skip(reasons);
        }
        if validation.repaired {
            draft.tags.push("repaired=true".to_string());
        }
        let Some(mut candidate) = validation.candidate else {
            return draft.skip(vec!["validation produced no candidate".to_string()]);
        };
        if candidate.template_version.is_none() {
            candidate.template_version = Some(template.version.clone());
        }

        if candidate.order_type.is_skip() {
            let mut outcome = draft.skip(vec!["candidate declined to trade".to_string()]);
            outcome.candidate = Some(candidate);
            outcome.validation_score = Some(validation.score);
            return outcome;
        }

        // 4. session rules
        let rules = SessionRulesEngine::new(&map).with_template_strategy(&template.strategy);
        let filters = rules.apply_filters(&candidate, &session, &features, &symbol);
        if !filters.passed {
            return draft.skip(filters.reasons);
        }

        let adjustment = rules.adjust_confidence(&candidate, &session, &features, &symbol);
        candidate
            .confidence
            .insert("overall".to_string(), adjustment.adjusted);
        draft.tags.push(format!("confidence_delta={:+.1}", adjustment.delta()));

        tracing::info!(
            "{} OK: {} {} (confidence {:.0} -> {:.0}, score {:.0})",
            symbol,
            candidate.strategy,
            candidate.order_type,
            adjustment.original,
            adjustment.adjusted,
            validation.score
        );

        draft.finish(DecisionStatus::Ok, Some(candidate), Vec::new(), Some(validation.score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderType, Timeframe};
    use crate::ports::reasoning::{MockReasoningPort, ReasoningError};
    use crate::templates::TemplateSet;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use serde_json::json;

    /// Monday 2024-03-04 10:00 UTC, two hours into LONDON
    fn london_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
    }

    fn trend_snapshot() -> FeatureSnapshot {
        let mut snap = FeatureSnapshot::new("EURUSD", 1.1000)
            .with_value(Timeframe::M5, "adx", 38.0)
            .with_value(Timeframe::M15, "adx", 40.0)
            .with_value(Timeframe::H1, "adx", 35.0)
            .with_value(Timeframe::M15, "bb_width", 0.016)
            .with_value(Timeframe::M15, "atr", 0.0040)
            .with_value(Timeframe::M15, "bos", true)
            .with_value(Timeframe::M15, "range_position", 0.8)
            .with_trend_agreement(0.8);
        for tf in [Timeframe::M5, Timeframe::M15, Timeframe::H1] {
            snap = snap
                .with_value(tf, "ema200", 1.0800)
                .with_value(tf, "trend_slope", 0.4);
        }
        snap
    }

    fn trend_candidate() -> Value {
        json!({
            "strategy": "trend_pullback",
            "order_type": "buy_stop",
            "entry": 1.1010,
            "stop": 1.0985,
            "target": 1.1060,
            "risk_reward": 2.0,
            "confidence": {"overall": 70, "regime_fit": 70, "structure": 65, "execution": 70},
            "rationale": "pullback held above rising EMA, BOS on M15",
            "tags": ["trend"]
        })
    }

    fn orchestrator(reasoning: MockReasoningPort) -> DecisionOrchestrator {
        DecisionOrchestrator::new(
            Arc::new(StrategyMapStore::in_memory(StrategyMap::default())),
            Arc::new(TemplateCatalog::builtin()),
            Arc::new(reasoning),
        )
    }

    fn returning(candidate: Option<Value>) -> MockReasoningPort {
        let mut mock = MockReasoningPort::new();
        mock.expect_propose()
            .times(1)
            .returning(move |_| Ok(candidate.clone()));
        mock
    }

    fn request() -> DecisionRequest {
        DecisionRequest::new(trend_snapshot()).at(london_morning())
    }

    #[tokio::test]
    async fn test_trend_candidate_accepted() {
        let outcome = orchestrator(returning(Some(trend_candidate()))).decide(&request()).await;

        assert!(outcome.is_ok(), "{:?}", outcome.skip_reasons);
        assert_eq!(outcome.regime, MarketRegime::Trend);
        assert_eq!(outcome.template_id.as_deref(), Some("trend_pullback_v1"));
        assert_eq!(outcome.session_tag, "LONDON");
        for tag in ["session=LONDON", "regime=TREND", "template=trend_pullback_v1", "overlap=none", "transition=false", "symbol=EURUSD"] {
            assert!(outcome.tags.iter().any(|t| t == tag), "missing tag {}", tag);
        }

        // 70 + (5 + 5) profile + 10 London BOS
        let candidate = outcome.candidate.unwrap();
        assert_relative_eq!(candidate.overall_confidence(), 90.0);
        assert_eq!(candidate.template_version.as_deref(), Some("1.0"));
        assert!(outcome.tags.iter().any(|t| t == "confidence_delta=+20.0"));
    }

    #[tokio::test]
    async fn test_prompt_carries_rendered_template() {
        let mut mock = MockReasoningPort::new();
        mock.expect_propose()
            .withf(|req| {
                req.template_id == "trend_pullback_v1"
                    && req.regime == MarketRegime::Trend
                    && req.prompt.contains("EURUSD")
                    && !req.prompt.contains("{{")
            })
            .times(1)
            .returning(|_| Ok(None));
        let outcome = orchestrator(mock).decide(&request()).await;
        assert!(outcome.has_reason("no candidate"));
    }

    #[tokio::test]
    async fn test_unknown_regime_skips_without_reasoning() {
        let mut mock = MockReasoningPort::new();
        mock.expect_propose().never();
        let snap = FeatureSnapshot::new("EURUSD", 1.1).with_value(Timeframe::H4, "adx", 30.0);
        let outcome = orchestrator(mock)
            .decide(&DecisionRequest::new(snap).at(london_morning()))
            .await;
        assert!(outcome.is_skip());
        assert_eq!(outcome.regime, MarketRegime::Unknown);
        assert_eq!(outcome.skip_reasons, vec!["unknown regime: avoiding default trend bias".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_snapshot_with_guardrails_is_unknown() {
        let mut mock = MockReasoningPort::new();
        mock.expect_propose().never();
        // Tuesday 02:00 UTC, ASIA, where a zeroed frame would read as a range
        let asia = Utc.with_ymd_and_hms(2024, 3, 5, 2, 0, 0).unwrap();
        let guardrails = Guardrails {
            news_block: true,
            ..Default::default()
        };
        let request = DecisionRequest::new(FeatureSnapshot::new("EURUSD", 1.1))
            .with_guardrails(guardrails)
            .at(asia);
        let outcome = orchestrator(mock).decide(&request).await;
        assert_eq!(outcome.regime, MarketRegime::Unknown);
        assert_eq!(outcome.skip_reasons, vec![UNKNOWN_REGIME_REASON.to_string()]);
        assert!(outcome.template_id.is_none());
    }

    #[tokio::test]
    async fn test_weekend_unknown_reports_both_reasons() {
        let mut mock = MockReasoningPort::new();
        mock.expect_propose().never();
        let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let snap = FeatureSnapshot::new("EURUSD", 1.1).with_value(Timeframe::H4, "adx", 30.0);
        let outcome = orchestrator(mock)
            .decide(&DecisionRequest::new(snap).at(saturday))
            .await;
        assert_eq!(outcome.regime, MarketRegime::Unknown);
        assert_eq!(
            outcome.skip_reasons,
            vec![UNKNOWN_REGIME_REASON.to_string(), "market closed: weekend".to_string()]
        );
    }

    #[tokio::test]
    async fn test_outcome_stamped_with_evaluation_instant() {
        let outcome = orchestrator(returning(Some(trend_candidate()))).decide(&request()).await;
        assert_eq!(outcome.timestamp, london_morning());

        let mut mock = MockReasoningPort::new();
        mock.expect_propose().never();
        let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let snap = trend_snapshot().with_timestamp(saturday);
        let outcome = orchestrator(mock).decide(&DecisionRequest::new(snap)).await;
        assert_eq!(outcome.timestamp, saturday);
        assert!(outcome.session.is_weekend);
    }

    #[tokio::test]
    async fn test_reasoning_failure_is_skip() {
        let mut mock = MockReasoningPort::new();
        mock.expect_propose()
            .returning(|_| Err(ReasoningError::RequestError("connection refused".to_string())));
        let outcome = orchestrator(mock).decide(&request()).await;
        assert!(outcome.is_skip());
        assert!(outcome.has_reason("connection refused"));
        assert_eq!(outcome.template_id.as_deref(), Some("trend_pullback_v1"));
    }

    #[tokio::test]
    async fn test_invalid_candidate_reports_errors() {
        let mut candidate = trend_candidate();
        candidate["risk_reward"] = json!(1.2);
        candidate["target"] = json!(1.1040);
        let outcome = orchestrator(returning(Some(candidate))).decide(&request()).await;
        assert!(outcome.is_skip());
        assert!(outcome.has_reason("RR too low"));
        assert!(outcome.candidate.is_none());
    }

    #[tokio::test]
    async fn test_declined_candidate() {
        let declined = json!({
            "strategy": "trend_pullback",
            "order_type": "hold",
            "confidence": {"overall": 30},
            "rationale": "pullback not complete",
            "tags": []
        });
        let outcome = orchestrator(returning(Some(declined))).decide(&request()).await;
        assert!(outcome.is_skip());
        assert_eq!(outcome.skip_reasons, vec!["candidate declined to trade".to_string()]);
        assert_eq!(outcome.candidate.unwrap().order_type, OrderType::Skip);
    }

    #[tokio::test]
    async fn test_session_filter_blocks_early_entry() {
        // 08:05 UTC, five minutes into LONDON (and the ASIA_LONDON overlap)
        let early = Utc.with_ymd_and_hms(2024, 3, 4, 8, 5, 0).unwrap();
        let outcome = orchestrator(returning(Some(trend_candidate())))
            .decide(&DecisionRequest::new(trend_snapshot()).at(early))
            .await;
        assert!(outcome.is_skip());
        assert!(outcome.has_reason("too early in LONDON"), "{:?}", outcome.skip_reasons);
        assert!(outcome.tags.iter().any(|t| t == "transition=true"));
    }

    #[tokio::test]
    async fn test_guardrails_block_entry() {
        let guardrails = Guardrails {
            news_block: true,
            ..Default::default()
        };
        let outcome = orchestrator(returning(Some(trend_candidate())))
            .decide(&request().with_guardrails(guardrails))
            .await;
        assert!(outcome.is_skip());
        assert!(outcome.has_reason("news blackout"));
    }

    #[tokio::test]
    async fn test_unhealthy_template_skips() {
        let mut broken = crate::templates::builtin_templates().remove(0);
        broken.body = "no placeholders here".to_string();
        let catalog = TemplateCatalog::from_set(TemplateSet::from_templates(vec![broken]));
        let mut mock = MockReasoningPort::new();
        mock.expect_propose().never();
        let orch = DecisionOrchestrator::new(
            Arc::new(StrategyMapStore::in_memory(StrategyMap::default())),
            Arc::new(catalog),
            Arc::new(mock),
        );
        let outcome = orch.decide(&request()).await;
        assert!(outcome.is_skip());
        assert!(outcome.has_reason("FEATURES_JSON"), "{:?}", outcome.skip_reasons);
    }

    #[tokio::test]
    async fn test_weekend_skips() {
        let mut mock = MockReasoningPort::new();
        mock.expect_propose().never();
        let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let outcome = orchestrator(mock)
            .decide(&DecisionRequest::new(trend_snapshot()).at(saturday))
            .await;
        assert!(outcome.has_reason("weekend"));
        assert!(outcome.session.is_weekend);
    }

    #[test]
    fn test_decide_blocking() {
        let orch = orchestrator(returning(Some(trend_candidate())));
        let outcome = tokio_test::block_on(orch.decide(&request()));
        assert!(outcome.is_ok());
        let json = outcome.to_json();
        assert!(json.contains("\"status\": \"ok\""));
    }

    #[test]
    fn test_classify_only() {
        let orch = orchestrator(MockReasoningPort::new());
        let (session, classification) = orch.classify(&request());
        assert_eq!(session.minutes_into_session, 120);
        assert_eq!(classification.regime, MarketRegime::Trend);
    }
}
