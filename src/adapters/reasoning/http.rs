//! HTTP Reasoning Client
//!
//! Posts a `ProposalRequest` to the configured endpoint and reads the
//! candidate back. The body may be the candidate itself, `null`, or an
//! envelope `{"candidate": ...}`. `204 No Content` means no proposal.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::ports::reasoning::{ProposalRequest, ReasoningError, ReasoningPort};

/// HTTP reasoning client configuration
#[derive(Debug, Clone)]
pub struct HttpReasoningConfig {
    pub endpoint: String,
    /// Optional bearer token
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl HttpReasoningConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpReasoningClient {
    config: HttpReasoningConfig,
    http: Client,
}

impl HttpReasoningClient {
    pub fn new(config: HttpReasoningConfig) -> Result<Self, ReasoningError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ReasoningError::RequestError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

/// Pull the candidate out of a response body
fn extract_candidate(body: Value) -> Result<Option<Value>, ReasoningError> {
    match body {
        Value::Null => Ok(None),
        Value::Object(mut obj) if obj.contains_key("candidate") => match obj.remove("candidate") {
            Some(Value::Null) | None => Ok(None),
            Some(candidate @ Value::Object(_)) => Ok(Some(candidate)),
            Some(other) => Err(ReasoningError::ParseError(format!(
                "candidate must be an object, got {}",
                other
            ))),
        },
        candidate @ Value::Object(_) => Ok(Some(candidate)),
        other => Err(ReasoningError::ParseError(format!(
            "expected a JSON object or null, got {}",
            other
        ))),
    }
}

#[async_trait]
impl ReasoningPort for HttpReasoningClient {
    async fn propose(&self, request: &ProposalRequest) -> Result<Option<Value>, ReasoningError> {
        let mut req = self.http.post(&self.config.endpoint).json(request);
        if let Some(ref api_key) = self.config.api_key {
            req = req.bearer_auth(api_key);
        }

        tracing::debug!(
            "Requesting proposal for {} from {} (template {} v{})",
            request.symbol,
            self.config.endpoint,
            request.template_id,
            request.template_version
        );

        let response = req
            .send()
            .await
            .map_err(|e| ReasoningError::RequestError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::ServiceError {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ReasoningError::ParseError(e.to_string()))?;
        extract_candidate(body)
    }
}
