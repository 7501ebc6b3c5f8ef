//! Maps [`memory_core::Error`] onto HTTP status codes and a JSON error body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn rate_limited() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded")
    }
}

impl From<memory_core::Error> for ApiError {
    fn from(err: memory_core::Error) -> Self {
        use memory_core::Error as E;
        let status = match &err {
            E::Validation(_) => StatusCode::BAD_REQUEST,
            E::NotFound(_) => StatusCode::NOT_FOUND,
            E::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            E::Timeout => StatusCode::GATEWAY_TIMEOUT,
            E::CircuitBreakerOpen | E::Store(_) | E::Configuration(_) | E::Embedding(_)
            | E::Serialization(_) | E::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    /// Body shape is `{detail}` (§7); `request_id` is not duplicated here —
    /// it's already on the response via the `x-request-id` header the
    /// request-id layer propagates for every response, errors included.
    fn into_response(self) -> Response {
        if self.status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(detail = %self.message, "request failed");
        }
        let body = json!({ "detail": self.message });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
