//! Replay Reasoning Source
//!
//! Serves a candidate recorded in a JSON file, for offline runs and
//! journal replays. A file holding `null` replays "no proposal"; a file
//! keyed by symbol (`{"by_symbol": {"EURUSD": {...}}}`) serves per-symbol
//! candidates.

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde_json::Value;

use crate::ports::reasoning::{ProposalRequest, ReasoningError, ReasoningPort};

#[derive(Debug, Clone)]
pub struct ReplayReasoning {
    path: PathBuf,
}

impl ReplayReasoning {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn pick_candidate(doc: Value, symbol: &str) -> Option<Value> {
    match doc {
        Value::Object(mut obj) if obj.contains_key("by_symbol") => obj
            .remove("by_symbol")
            .and_then(|mut by_symbol| by_symbol.get_mut(symbol).map(Value::take))
            .filter(|c| !c.is_null()),
        Value::Null => None,
        other => Some(other),
    }
}

#[async_trait]
impl ReasoningPort for ReplayReasoning {
    async fn propose(&self, request: &ProposalRequest) -> Result<Option<Value>, ReasoningError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ReasoningError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let doc: Value =
            serde_json::from_str(&raw).map_err(|e| ReasoningError::ParseError(e.to_string()))?;
        let candidate = pick_candidate(doc, &request.symbol);
        tracing::debug!(
            "Replaying {} for {} from {}",
            if candidate.is_some() { "candidate" } else { "no proposal" },
            request.symbol,
            self.path.display()
        );
        Ok(candidate)
    }
}
