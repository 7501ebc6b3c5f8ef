//! Request-level cross-cutting middleware: rate limiting (§4.8).

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use crate::state::AppState;

/// Resolve the rate-limit key for a request: `tenant_id` from the query
/// string or an `x-tenant-id` header when present, otherwise the client's
/// socket address, per the "tenant, or client IP as fallback" rule.
fn rate_limit_key(request: &Request) -> String {
    if let Some(tenant_id) = request.uri().query().and_then(query_tenant_id) {
        return tenant_id;
    }
    if let Some(header) = request
        .headers()
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
    {
        return header.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .map(|ip: IpAddr| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn query_tenant_id(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "tenant_id").then(|| value.to_string())
    })
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = rate_limit_key(&request);
    if !state.rate_limiter.admit(&key) {
        return Err(ApiError::rate_limited());
    }
    Ok(next.run(request).await)
}
