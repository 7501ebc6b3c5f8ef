//! `GET /v1/memory/search`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use memory_core::service::{RetrieveParams, RetrieveResponse};

use super::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub tenant_id: String,
    pub query: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default)]
    pub importance_min: Option<f32>,
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: u32,
}

fn default_top_k() -> u32 {
    5
}

fn default_candidate_limit() -> u32 {
    200
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<RetrieveResponse>> {
    let response = state
        .service
        .retrieve(RetrieveParams {
            tenant_id: query.tenant_id,
            conversation_id: query.conversation_id,
            query: query.query,
            top_k: query.top_k.clamp(1, 20),
            importance_min: query.importance_min,
            candidate_limit: query.candidate_limit.clamp(1, 1000),
        })
        .await?;
    Ok(Json(response))
}
