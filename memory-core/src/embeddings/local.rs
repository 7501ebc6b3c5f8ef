//! In-process CPU embedding provider.
//!
//! Stands in for a real local model (ONNX/tokenizer based, as in fuller
//! embedding stacks) with a lightweight bag-of-words hash so the crate has
//! no binary model-file dependency. Distinct from [`super::deterministic`]
//! only in that it folds per-word hashes rather than the whole string, which
//! gives texts sharing vocabulary measurably non-zero cosine similarity.
use async_trait::async_trait;

use super::provider::EmbeddingProvider;

pub struct LocalModelProvider {
    name: String,
    dimension: usize,
}

impl LocalModelProvider {
    #[must_use]
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut embedding = vec![0.0f32; self.dimension];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash as usize) % self.dimension;
            let sign = if hash & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }
        super::similarity::normalize(embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalModelProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        // Simulates the latency of an in-process model call without
        // blocking the runtime.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        Ok(self.embed_sync(text))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_vocabulary_has_nonzero_similarity() {
        let provider = LocalModelProvider::new("local", 64);
        let a = provider.embed("the quick brown fox").await.unwrap();
        let b = provider.embed("the quick brown dog").await.unwrap();
        let sim = crate::embeddings::similarity::cosine_similarity(&a, &b);
        assert!(sim > 0.0, "expected positive similarity, got {sim}");
    }

    #[tokio::test]
    async fn output_matches_configured_dimension() {
        let provider = LocalModelProvider::new("local", 32);
        let v = provider.embed("hello").await.unwrap();
        assert_eq!(v.len(), 32);
    }
}
