//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the regime gate.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::reasoning::{HttpReasoningClient, HttpReasoningConfig, ReplayReasoning};
use crate::application::{DecisionOrchestrator, DecisionRequest};
use crate::config::{load_config, Config, StrategyMap, StrategyMapStore};
use crate::domain::{FeatureSnapshot, Guardrails, MarketRegime};
use crate::ports::ReasoningPort;
use crate::strategy::session::{detect_session, detect_session_str};
use crate::templates::TemplateCatalog;

/// Regime Gate - regime-aware trade-signal decision pipeline
#[derive(Parser, Debug)]
#[command(
    name = "regime-gate",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Regime-aware trade-signal gate",
    long_about = "Classifies market regime and trading session from an indicator snapshot, \
                  selects a strategy template, validates the proposed trade and emits an \
                  accept/skip decision."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full pipeline on a feature snapshot
    Decide(DecideCmd),

    /// Classify session and regime without calling the reasoning service
    Classify(ClassifyCmd),

    /// Show the session context for an instant
    Session(SessionCmd),

    /// List and health-check strategy templates
    Templates(TemplatesCmd),
}

/// Full decision
#[derive(Parser, Debug)]
pub struct DecideCmd {
    /// Feature snapshot JSON, or a full request with `snapshot`/`guardrails`
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Guardrails JSON overriding any in the input
    #[arg(long, value_name = "FILE")]
    pub guardrails: Option<PathBuf>,

    /// Serve the candidate from a recorded JSON file instead of the reasoning service
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Evaluation instant (RFC 3339); defaults to the snapshot timestamp
    #[arg(long, value_name = "TIME")]
    pub at: Option<String>,

    /// Regime from the previous invocation, for hysteresis
    #[arg(long, value_name = "REGIME")]
    pub prev_regime: Option<String>,
}

/// Session + regime only
#[derive(Parser, Debug)]
pub struct ClassifyCmd {
    /// Feature snapshot JSON
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Evaluation instant (RFC 3339)
    #[arg(long, value_name = "TIME")]
    pub at: Option<String>,
}

/// Session context
#[derive(Parser, Debug)]
pub struct SessionCmd {
    /// Instant (RFC 3339); now when omitted
    #[arg(long, value_name = "TIME")]
    pub at: Option<String>,
}

/// Template catalog
#[derive(Parser, Debug)]
pub struct TemplatesCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Template catalog TOML overriding the configured one
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Run health checks on every template
    #[arg(long)]
    pub check: bool,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Decide(cmd) => decide_command(cmd).await,
        Command::Classify(cmd) => classify_command(cmd),
        Command::Session(cmd) => session_command(cmd),
        Command::Templates(cmd) => templates_command(cmd),
    }
}

fn load_app_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            tracing::info!("No config file given, using defaults");
            Ok(Config::default())
        }
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw.trim())
        .with_context(|| format!("Invalid RFC 3339 timestamp: {}", raw))?;
    Ok(ts.with_timezone(&Utc))
}

fn read_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Accept either a bare snapshot or a request wrapping one
fn read_request(path: &Path) -> Result<DecisionRequest> {
    let value = read_json(path)?;
    if value.get("snapshot").is_some() {
        serde_json::from_value(value).context("Invalid decision request")
    } else {
        let snapshot: FeatureSnapshot =
            serde_json::from_value(value).context("Invalid feature snapshot")?;
        Ok(DecisionRequest::new(snapshot))
    }
}

fn strategy_map_store(config: &Config) -> StrategyMapStore {
    match config.strategy_map_path() {
        Some(path) => StrategyMapStore::open_or_default(path),
        None => StrategyMapStore::in_memory(StrategyMap::default()),
    }
}

fn template_catalog(config: &Config, override_path: Option<&Path>) -> TemplateCatalog {
    match override_path.map(Path::to_path_buf).or_else(|| config.template_catalog_path()) {
        Some(path) => TemplateCatalog::open_or_builtin(path),
        None => TemplateCatalog::builtin(),
    }
}

fn reasoning_port(config: &Config, replay: Option<PathBuf>) -> Result<Arc<dyn ReasoningPort>> {
    if let Some(path) = replay {
        tracing::info!("Replaying candidates from {}", path.display());
        return Ok(Arc::new(ReplayReasoning::new(path)));
    }
    let Some(endpoint) = config.reasoning.get_endpoint() else {
        bail!("No reasoning source: set reasoning.endpoint (or REASONING_ENDPOINT) or pass --replay");
    };
    let client = HttpReasoningClient::new(HttpReasoningConfig {
        endpoint,
        api_key: config.reasoning.get_api_key(),
        timeout: Duration::from_secs(config.reasoning.timeout_secs),
    })
    .context("Failed to create reasoning client")?;
    Ok(Arc::new(client))
}

fn build_orchestrator(config: &Config, replay: Option<PathBuf>) -> Result<DecisionOrchestrator> {
    let reasoning = reasoning_port(config, replay)?;
    Ok(DecisionOrchestrator::new(
        Arc::new(strategy_map_store(config)),
        Arc::new(template_catalog(config, None)),
        reasoning,
    )
    .with_hot_reload(config.pipeline.hot_reload))
}

/// Handle decide command
async fn decide_command(cmd: DecideCmd) -> Result<()> {
    let config = load_app_config(cmd.config.as_deref())?;
    let mut request = read_request(&cmd.input)?;

    if let Some(ref path) = cmd.guardrails {
        let guardrails: Guardrails =
            serde_json::from_value(read_json(path)?).context("Invalid guardrails")?;
        request.guardrails = guardrails;
    }
    if let Some(ref at) = cmd.at {
        request.now = Some(parse_instant(at)?);
    }
    if let Some(ref raw) = cmd.prev_regime {
        let regime: MarketRegime = raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid --prev-regime: {}", e))?;
        request.prev_regime = Some(regime);
    }

    let orchestrator = build_orchestrator(&config, cmd.replay)?;
    let outcome = orchestrator.decide(&request).await;
    println!("{}", outcome.to_json());
    Ok(())
}

/// Handle classify command
fn classify_command(cmd: ClassifyCmd) -> Result<()> {
    let config = load_app_config(cmd.config.as_deref())?;
    let mut request = read_request(&cmd.input)?;
    if let Some(ref at) = cmd.at {
        request.now = Some(parse_instant(at)?);
    }

    let orchestrator = DecisionOrchestrator::new(
        Arc::new(strategy_map_store(&config)),
        Arc::new(TemplateCatalog::builtin()),
        Arc::new(crate::ports::StaticReasoning::new()),
    );
    let (session, classification) = orchestrator.classify(&request);

    let session_tag = session.tag();
    let report = json!({
        "symbol": request.snapshot.symbol,
        "session": session,
        "session_tag": session_tag,
        "regime": classification.regime,
        "scores": classification.scores.rounded(),
        "classification": classification,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Handle session command
fn session_command(cmd: SessionCmd) -> Result<()> {
    let ctx = match cmd.at {
        Some(ref raw) => {
            // validate first so a typo is an error, not a silent default
            parse_instant(raw)?;
            detect_session_str(raw)
        }
        None => detect_session(Utc::now()),
    };
    println!("{}", serde_json::to_string_pretty(&ctx)?);
    Ok(())
}

/// Handle templates command
fn templates_command(cmd: TemplatesCmd) -> Result<()> {
    let config = load_app_config(cmd.config.as_deref())?;
    let catalog = template_catalog(&config, cmd.catalog.as_deref());

    let mut unhealthy = 0;
    for template in catalog.list() {
        let active = catalog.active_version(&template.strategy).as_deref() == Some(template.version.as_str());
        println!(
            "{:<16} {:<8} {:<20} {:<9} RR {:.1}-{:.1} {}",
            template.strategy,
            template.version,
            template.id,
            template.regime,
            template.min_rr,
            template.max_rr,
            if active { "(active)" } else { "" }
        );

        if cmd.check {
            let report = catalog.health_check(&template);
            if report.is_healthy() {
                println!("  ✓ healthy");
            } else {
                unhealthy += 1;
                for issue in &report.issues {
                    println!("  ✗ {}", issue);
                }
            }
        }
    }

    if unhealthy > 0 {
        bail!("{} template(s) failed health checks", unhealthy);
    }
    Ok(())
}
