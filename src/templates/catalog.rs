//! Template Catalog
//!
//! Versioned strategy templates behind an immutable snapshot. The catalog
//! file (TOML) is merged over the built-in set:
//!
//! ```toml
//! [active]
//! breakout = "1.1"
//!
//! [[templates]]
//! id = "breakout_v1_1"
//! version = "1.1"
//! strategy = "breakout"
//! regime = "VOLATILE"
//! order_types = ["buy_stop", "sell_stop"]
//! min_rr = 2.2
//! max_rr = 5.0
//! body = "... {{FEATURES_JSON}} ... RR ≥ 2.2"
//! ```
//!
//! Without an `[active]` entry the highest version of a strategy is active.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use thiserror::Error;

use super::builtin::builtin_templates;
use super::health::{HealthReport, TemplateHealthChecker};
use super::template::{compare_versions, StrategyTemplate};
use crate::config::snapshot::{modified_at, SnapshotCell};
use crate::domain::{FeatureSnapshot, MarketRegime, SessionContext, TradingSession};

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read template catalog: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse template catalog: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid template catalog: {0}")]
    ValidationError(String),
}

/// On-disk catalog layout
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub active: BTreeMap<String, String>,
    #[serde(default)]
    pub templates: Vec<StrategyTemplate>,
}

/// Immutable template snapshot
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    /// strategy -> version -> template
    templates: BTreeMap<String, BTreeMap<String, Arc<StrategyTemplate>>>,
    /// Explicit active version per strategy
    active: BTreeMap<String, String>,
}

impl TemplateSet {
    pub fn from_templates(templates: Vec<StrategyTemplate>) -> Self {
        let mut set = Self::default();
        for template in templates {
            set.insert(template);
        }
        set
    }

    pub fn builtin() -> Self {
        Self::from_templates(builtin_templates())
    }

    fn insert(&mut self, template: StrategyTemplate) {
        self.templates
            .entry(template.strategy.clone())
            .or_default()
            .insert(template.version.clone(), Arc::new(template));
    }

    /// Merge a catalog file over this set; same strategy+version replaces
    pub fn merge(mut self, file: CatalogFile) -> Result<Self, CatalogError> {
        for template in file.templates {
            if template.strategy.trim().is_empty() || template.version.trim().is_empty() {
                return Err(CatalogError::ValidationError(format!(
                    "template '{}' needs a strategy and a version",
                    template.id
                )));
            }
            self.insert(template);
        }
        for (strategy, version) in file.active {
            let known = self
                .templates
                .get(&strategy)
                .is_some_and(|versions| versions.contains_key(&version));
            if !known {
                return Err(CatalogError::ValidationError(format!(
                    "active version {} of {} is not in the catalog",
                    version, strategy
                )));
            }
            self.active.insert(strategy, version);
        }
        Ok(self)
    }

    pub fn get(&self, strategy: &str, version: &str) -> Option<Arc<StrategyTemplate>> {
        self.templates.get(strategy)?.get(version).cloned()
    }

    pub fn active_version(&self, strategy: &str) -> Option<String> {
        if let Some(v) = self.active.get(strategy) {
            return Some(v.clone());
        }
        self.templates
            .get(strategy)?
            .keys()
            .max_by(|a, b| compare_versions(a, b))
            .cloned()
    }

    pub fn active(&self, strategy: &str) -> Option<Arc<StrategyTemplate>> {
        let version = self.active_version(strategy)?;
        self.get(strategy, &version)
    }

    /// Every template, ordered by strategy then version
    pub fn list(&self) -> Vec<Arc<StrategyTemplate>> {
        let mut all: Vec<Arc<StrategyTemplate>> = self
            .templates
            .values()
            .flat_map(|versions| versions.values().cloned())
            .collect();
        all.sort_by(|a, b| {
            a.strategy
                .cmp(&b.strategy)
                .then_with(|| compare_versions(&a.version, &b.version))
        });
        all
    }
}

/// Selection thresholds, resolved from the strategy map's `selection` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// LONDON/NY range fades need M15 band width above this
    pub wide_range_bb_width: f64,
    /// ASIA breakouts need volume z-score above this
    pub asia_breakout_volume_z: f64,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            wide_range_bb_width: 0.03,
            asia_breakout_volume_z: 1.5,
        }
    }
}

/// Skip reason for an UNKNOWN regime
pub const UNKNOWN_REGIME_REASON: &str = "unknown regime: avoiding default trend bias";

/// Template choice for a regime/session pair
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSelection {
    Selected(Arc<StrategyTemplate>),
    /// No template applies; the reason explains why
    Skip(String),
}

/// Catalog with atomic reload
#[derive(Debug)]
pub struct TemplateCatalog {
    path: Option<PathBuf>,
    cell: SnapshotCell<TemplateSet>,
    stamp: Mutex<Option<SystemTime>>,
    checker: TemplateHealthChecker,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateCatalog {
    pub fn builtin() -> Self {
        Self::from_set(TemplateSet::builtin())
    }

    pub fn from_set(set: TemplateSet) -> Self {
        Self {
            path: None,
            cell: SnapshotCell::new(set),
            stamp: Mutex::new(None),
            checker: TemplateHealthChecker::new(),
        }
    }

    fn load_file(path: &Path) -> Result<TemplateSet, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let file: CatalogFile = toml::from_str(&raw)?;
        TemplateSet::builtin().merge(file)
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let stamp = modified_at(&path);
        let set = Self::load_file(&path)?;
        tracing::info!("Loaded template catalog from {}", path.display());
        Ok(Self {
            path: Some(path),
            cell: SnapshotCell::new(set),
            stamp: Mutex::new(stamp),
            checker: TemplateHealthChecker::new(),
        })
    }

    /// Open a catalog file, falling back to the built-in set on any error
    pub fn open_or_builtin(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(
                    "Failed to load template catalog {}: {} - using built-in templates",
                    path.display(),
                    e
                );
                Self {
                    path: Some(path),
                    ..Self::builtin()
                }
            }
        }
    }

    pub fn snapshot(&self) -> Arc<TemplateSet> {
        self.cell.load()
    }

    pub fn get(&self, strategy: &str, version: &str) -> Option<Arc<StrategyTemplate>> {
        self.snapshot().get(strategy, version)
    }

    pub fn active_version(&self, strategy: &str) -> Option<String> {
        self.snapshot().active_version(strategy)
    }

    pub fn active(&self, strategy: &str) -> Option<Arc<StrategyTemplate>> {
        self.snapshot().active(strategy)
    }

    pub fn list(&self) -> Vec<Arc<StrategyTemplate>> {
        self.snapshot().list()
    }

    pub fn health_check(&self, template: &StrategyTemplate) -> HealthReport {
        self.checker.check(template)
    }

    /// Re-read the catalog file; on error the current snapshot stays
    pub fn reload(&self) -> Result<(), CatalogError> {
        let mut stamp = self.stamp.lock().unwrap_or_else(|p| p.into_inner());
        self.reload_locked(&mut stamp)
    }

    /// Reload when the file's mtime changed; returns whether a swap happened
    pub fn reload_if_changed(&self) -> Result<bool, CatalogError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };
        let mut stamp = self.stamp.lock().unwrap_or_else(|p| p.into_inner());
        let current = modified_at(path);
        if current.is_none() || current == *stamp {
            return Ok(false);
        }
        self.reload_locked(&mut stamp)?;
        Ok(true)
    }

    fn reload_locked(&self, stamp: &mut Option<SystemTime>) -> Result<(), CatalogError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let observed = modified_at(path);
        let set = Self::load_file(path)?;
        self.cell.swap(set);
        *stamp = observed;
        tracing::info!("Template catalog reloaded from {}", path.display());
        Ok(())
    }

    /// Pick a template with the default selection thresholds
    pub fn select(
        &self,
        regime: MarketRegime,
        ctx: &SessionContext,
        features: &FeatureSnapshot,
    ) -> TemplateSelection {
        self.select_with(regime, ctx, features, &SelectionPolicy::default())
    }

    pub fn select_with(
        &self,
        regime: MarketRegime,
        ctx: &SessionContext,
        features: &FeatureSnapshot,
        policy: &SelectionPolicy,
    ) -> TemplateSelection {
        let strategy = match select_strategy(regime, ctx, features, policy) {
            Ok(strategy) => strategy,
            Err(reason) => return TemplateSelection::Skip(reason),
        };
        match self.active(strategy) {
            Some(template) => TemplateSelection::Selected(template),
            None => TemplateSelection::Skip(format!("no active template for strategy {}", strategy)),
        }
    }
}

/// Strategy for a regime/session pair, or the reason none applies
pub fn select_strategy(
    regime: MarketRegime,
    ctx: &SessionContext,
    features: &FeatureSnapshot,
    policy: &SelectionPolicy,
) -> Result<&'static str, String> {
    let frame = features.primary();
    match regime {
        MarketRegime::Trend => Ok("trend_pullback"),
        MarketRegime::Range => match ctx.session {
            TradingSession::Asia => Ok("range_fade"),
            TradingSession::London | TradingSession::NewYork => {
                let bb_width = frame.bb_width();
                if bb_width > policy.wide_range_bb_width {
                    Ok("range_fade")
                } else {
                    Err(format!(
                        "range too tight for {}: band width {:.4} <= {:.4}",
                        ctx.session, bb_width, policy.wide_range_bb_width
                    ))
                }
            }
            TradingSession::Unknown => Err(format!(
                "no range template outside a known session ({})",
                ctx.tag()
            )),
        },
        MarketRegime::Volatile => {
            if ctx.session.is_major() || ctx.is_overlap {
                Ok("breakout")
            } else if ctx.session == TradingSession::Asia {
                let volume_z = frame.volume_z();
                if volume_z > policy.asia_breakout_volume_z {
                    Ok("breakout")
                } else {
                    Err(format!(
                        "ASIA breakout needs volume z-score above {:.1}, got {:.2}",
                        policy.asia_breakout_volume_z, volume_z
                    ))
                }
            } else {
                Err(format!("no breakout template for session {}", ctx.tag()))
            }
        }
        MarketRegime::Unknown => Err(UNKNOWN_REGIME_REASON.to_string()),
    }
}
