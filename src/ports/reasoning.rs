//! Reasoning Port
//!
//! The external service that turns a rendered template into a candidate
//! trade proposal. Treated as a black box: it either returns a JSON
//! candidate, declines (`None`), or fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::MarketRegime;

/// One proposal request, built from the selected template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRequest {
    pub symbol: String,
    /// Template body with placeholders filled
    pub prompt: String,
    pub template_id: String,
    pub template_version: String,
    pub regime: MarketRegime,
    pub session_tag: String,
}

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("Reasoning request failed: {0}")]
    RequestError(String),
    #[error("Reasoning service returned {status}: {body}")]
    ServiceError { status: u16, body: String },
    #[error("Unreadable reasoning response: {0}")]
    ParseError(String),
    #[error("Reasoning source unavailable: {0}")]
    Unavailable(String),
}

/// Produces a candidate for a rendered prompt
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningPort: Send + Sync {
    /// `Ok(None)` when the service declined to propose anything
    async fn propose(&self, request: &ProposalRequest) -> Result<Option<Value>, ReasoningError>;
}
