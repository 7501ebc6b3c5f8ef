//! `EmbeddingProvider` trait and the closed set of implementations.

use async_trait::async_trait;

/// Converts text into a fixed-dimension vector.
///
/// `D` (the dimension) is a property of the provider instance, not the
/// trait; every implementation pads or truncates its raw output to exactly
/// `embedding_dimension()` before returning.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// The fixed dimension this provider always returns.
    fn embedding_dimension(&self) -> usize;

    /// A short identifier for logging/metadata, e.g. `"deterministic"`.
    fn name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A provider that fails its first `fail_count` calls, then succeeds.
    pub struct FlakyProvider {
        pub dimension: usize,
        pub calls: AtomicUsize,
        pub fail_count: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_count {
                anyhow::bail!("flaky provider: simulated failure {call}");
            }
            Ok(super::super::deterministic::hash_embedding(text, self.dimension))
        }

        fn embedding_dimension(&self) -> usize {
            self.dimension
        }

        fn name(&self) -> &str {
            "flaky-test-provider"
        }
    }
}
