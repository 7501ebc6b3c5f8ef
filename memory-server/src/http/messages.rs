//! `POST /v1/messages`, `GET /v1/messages/{id}`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use memory_core::service::{IngestOutcome, IngestRequest};
use memory_core::{Message, Role};

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateMessageBody {
    pub tenant_id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub importance_override: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub tenant_id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub metadata: serde_json::Value,
    pub importance_score: Option<f32>,
    pub embedding_status: memory_core::EmbeddingStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            tenant_id: message.tenant_id,
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content,
            metadata: message.metadata.into_value(),
            importance_score: message.importance_score,
            embedding_status: message.embedding_status,
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

pub async fn create_message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateMessageBody>,
) -> ApiResult<Response> {
    let outcome = state
        .service
        .ingest(IngestRequest {
            tenant_id: body.tenant_id,
            conversation_id: body.conversation_id,
            role: body.role,
            content: body.content,
            metadata: body.metadata.unwrap_or(serde_json::Value::Null),
            importance_override: body.importance_override,
        })
        .await
        .map_err(ApiError::from)?;

    let status = match outcome {
        IngestOutcome::Completed(_) => StatusCode::OK,
        IngestOutcome::Enqueued(_) => StatusCode::ACCEPTED,
    };
    let response: MessageResponse = outcome.message().clone().into();
    Ok((status, Json(response)).into_response())
}

pub async fn get_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let message = state
        .service
        .fetch(id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::from(memory_core::Error::message_not_found(id)))?;
    Ok(Json(message.into()))
}
