//! Strategy Map
//!
//! The layered JSON document that parameterizes regime thresholds, session
//! profiles and validation rules. Shape:
//!
//! ```json
//! {
//!   "regime":     { "trend_gate": 35.0 },
//!   "validation": { "min_stop_atr": 0.4 },
//!   "symbols":  { "XAUUSD": { "regime": { "adx_cap": 60.0 } } },
//!   "sessions": { "ASIA":   { "regime": { "confident_gate": 0.5 } } },
//!   "session_profiles": { "LONDON": { "min_adx": 20.0 }, "LONDON_NY": { } }
//! }
//! ```
//!
//! A section resolves as `defaults <- global <- symbols.<SYM> <- sessions.<SESSION>`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use super::layers::resolve_layers;
use super::loader::ConfigError;
use super::snapshot::{modified_at, SnapshotCell};
use crate::domain::TradingSession;

/// Parsed strategy map document
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyMap {
    doc: Value,
}

impl Default for StrategyMap {
    fn default() -> Self {
        Self {
            doc: Value::Object(Default::default()),
        }
    }
}

impl StrategyMap {
    /// Wrap a JSON document; the root must be an object
    pub fn from_value(doc: Value) -> Result<Self, ConfigError> {
        if !doc.is_object() {
            return Err(ConfigError::ValidationError(
                "strategy map root must be a JSON object".to_string(),
            ));
        }
        Ok(Self { doc })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Value at a key path, if present
    pub fn section(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.doc, |node, key| node.get(*key))
    }

    /// Override layers for `section`, in precedence order
    pub fn layers(&self, section: &str, symbol: &str, session: TradingSession) -> Vec<&Value> {
        [
            self.section(&[section]),
            self.section(&["symbols", symbol, section]),
            self.section(&["sessions", session.as_str(), section]),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Resolve a typed section for a symbol/session.
    ///
    /// A malformed section is logged and the built-in defaults are used.
    pub fn resolve<T>(&self, section: &str, symbol: &str, session: TradingSession) -> T
    where
        T: Default + Serialize + DeserializeOwned,
    {
        let layers = self.layers(section, symbol, session);
        match resolve_layers::<T>(&layers) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(
                    "Strategy map section '{}' for {} / {} is malformed ({}), using defaults",
                    section,
                    symbol,
                    session,
                    e
                );
                T::default()
            }
        }
    }

    /// Session profile override keyed by session, overlap or transition name
    pub fn profile_override(&self, key: &str) -> Option<&Value> {
        self.section(&["session_profiles", key])
    }
}

/// Strategy map behind an atomically swappable snapshot
#[derive(Debug)]
pub struct StrategyMapStore {
    path: Option<PathBuf>,
    cell: SnapshotCell<StrategyMap>,
    /// Last seen mtime; the mutex also serializes reloads
    stamp: Mutex<Option<SystemTime>>,
}

impl StrategyMapStore {
    /// Store with no backing file
    pub fn in_memory(map: StrategyMap) -> Self {
        Self {
            path: None,
            cell: SnapshotCell::new(map),
            stamp: Mutex::new(None),
        }
    }

    /// Load from a file; errors are returned
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let stamp = modified_at(&path);
        let map = StrategyMap::from_file(&path)?;
        Ok(Self {
            path: Some(path),
            cell: SnapshotCell::new(map),
            stamp: Mutex::new(stamp),
        })
    }

    /// Load from a file, falling back to built-in defaults on any error.
    /// The path is remembered so a later reload can pick up a fixed file.
    pub fn open_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    "Failed to load strategy map {}: {} - using built-in defaults",
                    path.display(),
                    e
                );
                Self {
                    path: Some(path),
                    cell: SnapshotCell::new(StrategyMap::default()),
                    stamp: Mutex::new(None),
                }
            }
        }
    }

    pub fn current(&self) -> Arc<StrategyMap> {
        self.cell.load()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the backing file. All-or-nothing: on error the current
    /// snapshot stays in place.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let mut stamp = self.stamp.lock().unwrap_or_else(|p| p.into_inner());
        self.reload_locked(&mut stamp)
    }

    /// Reload only if the backing file's mtime changed. Returns whether a
    /// new snapshot was installed.
    pub fn reload_if_changed(&self) -> Result<bool, ConfigError> {
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

    fn reload_locked(&self, stamp: &mut Option<SystemTime>) -> Result<(), ConfigError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let observed = modified_at(path);
        let map = StrategyMap::from_file(path)?;
        self.cell.swap(map);
        *stamp = observed;
        tracing::info!("Strategy map reloaded from {}", path.display());
        Ok(())
    }
}
