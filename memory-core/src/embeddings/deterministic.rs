//! Deterministic, hash-seeded embeddings.
//!
//! Always succeeds. Used directly when `embedding_provider=mock`, and as the
//! fallback vector inside [`super::circuit_breaker::CircuitBreakerEmbeddingProvider`]
//! when the primary provider is unavailable.

use async_trait::async_trait;

use super::provider::EmbeddingProvider;

/// Hash `text` into a `dim`-length unit vector via a simple linear
/// congruential generator seeded from the text's hash.
#[must_use]
pub fn hash_embedding(text: &str, dim: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let mut seed = hasher.finish();

    let mut embedding = Vec::with_capacity(dim);
    for _ in 0..dim {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let value = ((seed >> 16) as f32) / 32768.0 - 1.0;
        embedding.push(value);
    }

    super::similarity::normalize(embedding)
}

/// Always-succeeds embedding provider used for tests, `mock` configuration,
/// and circuit-breaker fallback.
pub struct DeterministicProvider {
    dimension: usize,
}

impl DeterministicProvider {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(hash_embedding(text, self.dimension))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "deterministic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let provider = DeterministicProvider::new(8);
        let a = provider.embed("hello world").await.unwrap();
        let b = provider.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let provider = DeterministicProvider::new(8);
        let a = provider.embed("hello").await.unwrap();
        let b = provider.embed("goodbye").await.unwrap();
        assert_ne!(a, b);
    }
}
