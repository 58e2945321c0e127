//! Configuration Module
//!
//! - `loader`: application config (TOML)
//! - `layers`: pure layered JSON merge
//! - `strategy_map`: layered strategy map with atomic reload
//! - `snapshot`: immutable snapshot cell shared by the reloadable catalogs

pub mod loader;
pub mod layers;
pub mod snapshot;
pub mod strategy_map;

pub use loader::{load_config, Config, ConfigError};
pub use layers::{merge_layers, overlay, resolve_layers};
pub use snapshot::SnapshotCell;
pub use strategy_map::{StrategyMap, StrategyMapStore};
