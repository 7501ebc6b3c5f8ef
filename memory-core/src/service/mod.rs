//! [`MessageService`]: orchestrates ingest and retrieve (§4.5).

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::{embedding_cache_key, search_cache_key, search_invalidation_prefix, ResultCache};
use crate::config::{CacheConfig, EmbeddingConfig};
use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::model::{EmbeddingStatus, Message, Metadata, Role};
use crate::ranker::{rank, RankerWeights};
use crate::store::{ActiveMessageFilter, NewMessage, Repository};
use crate::validation;

/// Payload accepted by [`MessageService::ingest`].
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub tenant_id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub metadata: serde_json::Value,
    pub importance_override: Option<f32>,
}

/// Outcome of [`MessageService::ingest`], distinguishing the two response
/// statuses the HTTP shell must convey.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Synchronous mode: embedding already attempted.
    Completed(Message),
    /// Asynchronous mode: job enqueued, embedding still pending.
    Enqueued(Message),
}

impl IngestOutcome {
    #[must_use]
    pub fn message(&self) -> &Message {
        match self {
            IngestOutcome::Completed(m) | IngestOutcome::Enqueued(m) => m,
        }
    }
}

/// Query parameters accepted by [`MessageService::retrieve`].
#[derive(Debug, Clone)]
pub struct RetrieveParams {
    pub tenant_id: String,
    pub conversation_id: Option<String>,
    pub query: String,
    pub top_k: u32,
    pub importance_min: Option<f32>,
    pub candidate_limit: u32,
}

/// A single ranked item in [`RetrieveResponse`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetrievedItem {
    pub message_id: Uuid,
    pub score: f64,
    pub similarity: f32,
    pub decay: f64,
    pub content: String,
    pub role: Role,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<Utc>,
    pub importance: f32,
}

/// Response shape for `GET /v1/memory/search`, also what gets cached
/// verbatim under the search key.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetrieveResponse {
    pub total: usize,
    pub items: Vec<RetrievedItem>,
}

/// Orchestrates ingest and retrieve against a [`Repository`], an
/// [`EmbeddingProvider`] and a [`ResultCache`].
pub struct MessageService {
    repository: Arc<dyn Repository>,
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<ResultCache>,
    embedding_config: EmbeddingConfig,
    cache_config: CacheConfig,
    max_results: u32,
    ranker_weights: RankerWeights,
}

impl MessageService {
    #[must_use]
    pub fn new(
        repository: Arc<dyn Repository>,
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<ResultCache>,
        embedding_config: EmbeddingConfig,
        cache_config: CacheConfig,
        max_results: u32,
    ) -> Self {
        Self {
            repository,
            provider,
            cache,
            embedding_config,
            cache_config,
            max_results,
            ranker_weights: RankerWeights::default(),
        }
    }

    /// Persist `request`, compute a base importance, and either embed
    /// synchronously or enqueue a durable job, per `async_embeddings`.
    #[instrument(skip(self, request), fields(tenant = %request.tenant_id, conversation = %request.conversation_id))]
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        validation::validate_tenant_id(&request.tenant_id)?;
        validation::validate_conversation_id(&request.conversation_id)?;
        let content = validation::validate_content(&request.content)?;
        let metadata = Metadata::sanitize(request.metadata);

        let importance = match request.importance_override {
            Some(v) => validation::clamp_importance(v),
            None => base_importance(&content, request.role, Utc::now()),
        };

        let new_message = NewMessage {
            tenant_id: request.tenant_id.clone(),
            conversation_id: request.conversation_id.clone(),
            role: request.role,
            content: content.clone(),
            metadata,
            importance_score: Some(importance),
        };

        if self.embedding_config.async_embeddings {
            let mut tx = self.repository.begin().await?;
            let message = self.repository.create_message(&mut tx, new_message).await?;
            self.repository.enqueue_embedding_job(&mut tx, message.id).await?;
            self.repository.commit(tx).await?;
            info!(message_id = %message.id, "enqueued embedding job");
            return Ok(IngestOutcome::Enqueued(message));
        }

        let mut tx = self.repository.begin().await?;
        let message = self.repository.create_message(&mut tx, new_message).await?;

        let (embedding, status) = match self.provider.embed(&content).await {
            Ok(vector) => (Some(vector), EmbeddingStatus::Completed),
            Err(err) => {
                warn!(error = %err, "synchronous embedding failed");
                (None, EmbeddingStatus::Failed)
            }
        };

        let updated = self
            .repository
            .update_message_embedding(&mut tx, message.id, embedding, Some(importance), status)
            .await?
            .ok_or_else(|| Error::Internal("message disappeared mid-ingest".to_string()))?;
        self.repository.commit(tx).await?;

        self.cache.delete_prefix(&search_invalidation_prefix(
            &request.tenant_id,
            &request.conversation_id,
        ));

        Ok(IngestOutcome::Completed(updated))
    }

    /// Fetch a message by id, irrespective of archived state.
    pub async fn fetch(&self, id: Uuid) -> Result<Option<Message>> {
        let mut tx = self.repository.begin().await?;
        let message = self.repository.get_message(&mut tx, id).await?;
        self.repository.commit(tx).await?;
        Ok(message)
    }

    /// Consult the search cache; on miss, embed the query (through the
    /// embedding cache), load candidates, rank, cache and return.
    #[instrument(skip(self, params), fields(tenant = %params.tenant_id))]
    pub async fn retrieve(&self, params: RetrieveParams) -> Result<RetrieveResponse> {
        validation::validate_tenant_id(&params.tenant_id)?;
        if let Some(conversation_id) = &params.conversation_id {
            validation::validate_conversation_id(conversation_id)?;
        }

        let top_k = params.top_k.min(self.max_results).max(1);
        let candidate_limit = params.candidate_limit.min(self.max_results.saturating_mul(10)).max(1);

        let cache_key = search_cache_key(
            &params.tenant_id,
            params.conversation_id.as_deref(),
            top_k,
            candidate_limit,
            &params.query,
        );

        if self.cache_config.enabled {
            if let Some(cached) = self.cache.get_search(&cache_key) {
                if let Ok(response) = serde_json::from_value::<RetrieveResponse>(cached) {
                    return Ok(response);
                }
            }
        }

        let query_vec = self.embed_with_cache(&params.query).await?;

        let mut tx = self.repository.begin().await?;
        let filter = ActiveMessageFilter {
            conversation_id: params.conversation_id.clone(),
            importance_min: params.importance_min,
            limit: candidate_limit,
        };
        let candidates = self
            .repository
            .list_active_messages(&mut tx, &params.tenant_id, &filter)
            .await?;
        self.repository.commit(tx).await?;

        let ranked = rank(&query_vec, candidates, top_k as usize, self.ranker_weights, Utc::now());

        let response = RetrieveResponse {
            total: ranked.len(),
            items: ranked
                .into_iter()
                .map(|r| RetrievedItem {
                    message_id: r.message.id,
                    score: r.score,
                    similarity: r.similarity,
                    decay: r.decay,
                    content: r.message.content,
                    role: r.message.role,
                    metadata: r.message.metadata.into_value(),
                    created_at: r.message.created_at,
                    importance: r.message.importance_score.unwrap_or(0.0),
                })
                .collect(),
        };

        if self.cache_config.enabled {
            if let Ok(value) = serde_json::to_value(&response) {
                self.cache
                    .set_search(cache_key, value, self.cache_config.search_ttl);
            }
        }

        Ok(response)
    }

    async fn embed_with_cache(&self, text: &str) -> Result<Vec<f32>> {
        let key = embedding_cache_key(text);
        if self.cache_config.enabled {
            if let Some(vector) = self.cache.get_embedding(&key) {
                return Ok(vector);
            }
        }
        let vector = self.provider.embed(text).await.map_err(Error::Embedding)?;
        if self.cache_config.enabled {
            self.cache
                .set_embedding(key, vector.clone(), self.cache_config.embedding_ttl);
        }
        Ok(vector)
    }
}

/// Compute a base importance in `[0, 1]` from recency, role and an
/// explicit-signal heuristic (exclamation/question marks), normalised by
/// equal weighting across the three signals.
fn base_importance(content: &str, role: Role, now: chrono::DateTime<Utc>) -> f32 {
    let _ = now; // recency is maximal at creation time; reserved for future decay-at-ingest use.
    let role_weight = match role {
        Role::User => 0.6,
        Role::Assistant => 0.5,
        Role::System => 0.3,
    };
    let signal_weight = if content.contains('!') || content.contains('?') {
        0.7
    } else {
        0.4
    };
    let recency_weight = 1.0;

    ((role_weight + signal_weight + recency_weight) / 3.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_importance_is_bounded() {
        let now = Utc::now();
        let v = base_importance("hello!", Role::User, now);
        assert!((0.0..=1.0).contains(&v));
    }

    #[test]
    fn signals_raise_importance() {
        let now = Utc::now();
        let plain = base_importance("hello", Role::User, now);
        let urgent = base_importance("hello!!!", Role::User, now);
        assert!(urgent > plain);
    }
}
