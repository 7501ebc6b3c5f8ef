//! Network-backed embedding provider.

use async_trait::async_trait;
use serde::Deserialize;

use crate::retry::{retry, RetryConfig, Retryable};

use super::provider::EmbeddingProvider;

#[derive(Debug, Deserialize)]
struct RemoteEmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, thiserror::Error)]
enum RemoteError {
    #[error("transient remote embedding error: {0}")]
    Transient(String),
    #[error("remote embedding error: {0}")]
    Permanent(String),
}

impl Retryable for RemoteError {
    fn is_recoverable(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}

/// Calls a remote HTTP embedding endpoint: `POST {endpoint}` with
/// `{"text": ...}`, expecting `{"embedding": [...]}` back. Retried up to 3
/// times with exponential backoff (base 1s, cap 5s) on transient errors
/// (timeouts, connection failures, 5xx); 4xx responses are treated as
/// permanent.
pub struct RemoteProvider {
    client: reqwest::Client,
    endpoint: String,
    dimension: usize,
    retry_config: RetryConfig,
}

impl RemoteProvider {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            dimension,
            retry_config: RetryConfig::default(),
        }
    }

    async fn call_once(&self, text: &str) -> Result<Vec<f32>, RemoteError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| RemoteError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(RemoteError::Transient(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(RemoteError::Permanent(format!("status {status}")));
        }

        let body: RemoteEmbedResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Permanent(e.to_string()))?;
        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let raw = retry(&self.retry_config, || self.call_once(text)).await?;
        Ok(super::similarity::fit_dimension(raw, self.dimension))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "remote"
    }
}
