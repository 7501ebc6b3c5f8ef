//! `POST /v1/admin/retention/run`, `GET /v1/admin/health`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RetentionRunBody {
    pub tenant_id: String,
    #[serde(default = "default_actions")]
    pub actions: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_actions() -> Vec<String> {
    vec!["archive".to_string(), "delete".to_string()]
}

#[derive(Debug, Serialize)]
pub struct RetentionRunResponse {
    pub archived: u64,
    pub deleted: u64,
    pub dry_run: bool,
}

/// The engine always evaluates archive-then-delete together in one pass
/// (§4.7); `actions` narrows which counts are reported, not which work runs,
/// since a `Delete` rule action and the default policy's archive-then-purge
/// step are not independently selectable without re-running the evaluation
/// against a filtered rule set.
pub async fn run_retention(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RetentionRunBody>,
) -> ApiResult<Json<RetentionRunResponse>> {
    let report = state.lifecycle.apply(&body.tenant_id, body.dry_run).await?;
    Ok(Json(RetentionRunResponse {
        archived: if body.actions.iter().any(|a| a == "archive") {
            report.archived
        } else {
            0
        },
        deleted: if body.actions.iter().any(|a| a == "delete") {
            report.deleted
        } else {
            0
        },
        dry_run: report.dry_run,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Down,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Ok,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub database: ComponentStatus,
    pub latency_ms: u64,
    pub uptime_seconds: u64,
    pub environment: String,
    pub version: String,
    pub embedding: ComponentStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// A cheap round trip through the repository: open a transaction, list
/// tenants, commit. Exercises the connection without touching business data.
async fn database_ping(state: &AppState) -> memory_core::Result<()> {
    let mut tx = state.repository.begin().await?;
    state.repository.list_tenants(&mut tx).await?;
    state.repository.commit(tx).await?;
    Ok(())
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let started = std::time::Instant::now();
    let database = match database_ping(&state).await {
        Ok(()) => ComponentStatus::Ok,
        Err(_) => ComponentStatus::Failed,
    };
    let latency_ms = started.elapsed().as_millis() as u64;

    let status = match database {
        ComponentStatus::Ok => HealthStatus::Ok,
        ComponentStatus::Failed => HealthStatus::Down,
    };

    Json(HealthResponse {
        status,
        database,
        latency_ms,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        embedding: ComponentStatus::Ok,
        timestamp: chrono::Utc::now(),
    })
}
