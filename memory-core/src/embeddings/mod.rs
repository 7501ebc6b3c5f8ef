//! Text-to-vector providers: a closed set of implementations behind
//! [`provider::EmbeddingProvider`], decorated with failure isolation by
//! [`circuit_breaker::CircuitBreakerEmbeddingProvider`].

pub mod circuit_breaker;
pub mod deterministic;
pub mod local;
pub mod provider;
pub mod remote;
pub mod similarity;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerEmbeddingProvider, CircuitState};
pub use deterministic::DeterministicProvider;
pub use local::LocalModelProvider;
pub use provider::EmbeddingProvider;
pub use remote::RemoteProvider;
pub use similarity::cosine_similarity;

/// Build the configured primary provider, wrapped in the circuit breaker
/// with a deterministic fallback.
///
/// `kind` is one of `"mock"`, `"local"`, `"remote"` (see
/// [`crate::config::Config::embedding_provider`]).
pub fn build_provider(
    kind: &str,
    dimension: usize,
    remote_endpoint: Option<&str>,
    circuit_config: CircuitBreakerConfig,
) -> CircuitBreakerEmbeddingProvider {
    let primary: Box<dyn EmbeddingProvider> = match kind {
        "local" => Box::new(LocalModelProvider::new("local", dimension)),
        "remote" => {
            let endpoint = remote_endpoint.unwrap_or("http://localhost:8000/embed");
            Box::new(RemoteProvider::new(endpoint, dimension))
        }
        _ => Box::new(DeterministicProvider::new(dimension)),
    };
    CircuitBreakerEmbeddingProvider::new(primary, circuit_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_provider_defaults_to_mock() {
        let provider = build_provider("mock", 16, None, CircuitBreakerConfig::default());
        let v = provider.embed("hi").await.unwrap();
        assert_eq!(v.len(), 16);
    }
}
