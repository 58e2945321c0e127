use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use serde_json::Value;

use super::reasoning::{ProposalRequest, ReasoningError, ReasoningPort};

/// Reasoning port that replays a fixed response and records every request
#[derive(Debug, Default, Clone)]
pub struct StaticReasoning {
    calls: Arc<Mutex<Vec<ProposalRequest>>>,
    response: Arc<Mutex<Option<Value>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl StaticReasoning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the candidate returned for every request
    pub fn with_candidate(self, candidate: Value) -> Self {
        *self.response.lock().unwrap_or_else(|p| p.into_inner()) = Some(candidate);
        self
    }

    /// Builder method to make every request fail
    pub fn failing(self, message: &str) -> Self {
        *self.failure.lock().unwrap_or_else(|p| p.into_inner()) = Some(message.to_string());
        self
    }

    /// Get all recorded requests
    pub fn get_calls(&self) -> Vec<ProposalRequest> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl ReasoningPort for StaticReasoning {
    async fn propose(&self, request: &ProposalRequest) -> Result<Option<Value>, ReasoningError> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).push(request.clone());
        if let Some(message) = self.failure.lock().unwrap_or_else(|p| p.into_inner()).clone() {
            return Err(ReasoningError::Unavailable(message));
        }
        Ok(self.response.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarketRegime;
    use serde_json::json;

    fn request() -> ProposalRequest {
        ProposalRequest {
            symbol: "EURUSD".to_string(),
            prompt: "prompt".to_string(),
            template_id: "trend_pullback_v1".to_string(),
            template_version: "1.0".to_string(),
            regime: MarketRegime::Trend,
            session_tag: "LONDON".to_string(),
        }
    }

    #[tokio::test]
    async fn test_static_reasoning_records_calls() {
        let port = StaticReasoning::new().with_candidate(json!({"order_type": "skip"}));
        let result = port.propose(&request()).await.unwrap();
        assert_eq!(result, Some(json!({"order_type": "skip"})));
        assert_eq!(port.get_calls().len(), 1);
        assert_eq!(port.get_calls()[0].symbol, "EURUSD");
    }

    #[tokio::test]
    async fn test_static_reasoning_failure() {
        let port = StaticReasoning::new().failing("offline");
        assert!(port.propose(&request()).await.is_err());
        assert!(StaticReasoning::new().propose(&request()).await.unwrap().is_none());
    }
}
