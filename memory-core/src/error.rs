//! Error types for the conversation memory layer.

use uuid::Uuid;

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types produced by the core memory system.
///
/// Variants map to the error kinds in the external interface: the HTTP shell
/// (or any other transport) is responsible for translating these into status
/// codes, not the core itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("request timed out")]
    Timeout,

    #[error("circuit breaker open")]
    CircuitBreakerOpen,

    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("embedding provider error: {0}")]
    Embedding(#[from] anyhow::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for a not-found message-id error.
    #[must_use]
    pub fn message_not_found(id: Uuid) -> Self {
        Error::NotFound(format!("message {id} not found"))
    }

    /// Whether this error is transient and worth retrying with backoff.
    ///
    /// Used by the repository's internal retry wrapper and by the
    /// embedding-provider circuit breaker, which only counts recoverable
    /// failures against the consecutive-failure tally.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Store(_) | Error::Timeout | Error::CircuitBreakerOpen | Error::Embedding(_) => {
                true
            }
            Error::Validation(_)
            | Error::NotFound(_)
            | Error::RateLimited(_)
            | Error::Configuration(_)
            | Error::Serialization(_)
            | Error::Internal(_) => false,
        }
    }
}
