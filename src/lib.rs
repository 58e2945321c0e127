//! Regime Gate - Regime-Aware Trade-Signal Decision Pipeline
//!
//! Turns an indicator snapshot into an accept/skip decision: classifies the
//! market regime and trading session, selects a strategy template, obtains a
//! candidate from an external reasoning service, validates (and where
//! possible repairs) it, then applies session filters and confidence
//! adjustment.
//!
//! # Modules
//!
//! - `domain`: Core types (MarketRegime, SessionContext, FeatureSnapshot, TradeCandidate, DecisionOutcome)
//! - `config`: Application config, layered strategy map, reloadable snapshots
//! - `strategy`: Regime classifier, session detection, session profiles and rules
//! - `templates`: Strategy templates, health checks and the versioned catalog
//! - `validation`: Schema and business-rule validation, auto-repair, scoring
//! - `ports`: Trait abstractions (ReasoningPort)
//! - `adapters`: External implementations (HTTP reasoning, replay, CLI)
//! - `application`: DecisionOrchestrator

pub mod domain;
pub mod config;
pub mod strategy;
pub mod templates;
pub mod validation;
pub mod ports;
pub mod adapters;
pub mod application;
