//! Strategy Templates
//!
//! - `template`: the template type and prompt rendering
//! - `health`: rule-table health checks
//! - `builtin`: templates used when no catalog file is configured
//! - `catalog`: versioned catalog, atomic reload and regime/session selection

pub mod builtin;
pub mod catalog;
pub mod health;
pub mod template;

pub use builtin::builtin_templates;
pub use catalog::{
    select_strategy, CatalogError, CatalogFile, SelectionPolicy, TemplateCatalog, TemplateSelection,
    TemplateSet, UNKNOWN_REGIME_REASON,
};
pub use health::{HealthReport, TemplateHealthChecker};
pub use template::{StrategyTemplate, TemplateRules};
