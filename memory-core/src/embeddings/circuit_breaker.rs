//! Circuit breaker around the embedding provider, plus the
//! [`CircuitBreakerEmbeddingProvider`] decorator that makes provider outages
//! invisible to callers of `embed`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::provider::EmbeddingProvider;

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive successes in `half_open` before the circuit closes.
    pub half_open_successes: u32,
    /// How long the circuit stays open before probing again.
    pub recovery_time: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            half_open_successes: 2,
            recovery_time: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { consecutive_successes: u32 },
}

/// Externally observable circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Returned by [`CircuitBreaker::allow_request`] when the circuit is open.
/// Always recoverable: callers either retry later or fall back.
#[derive(Debug, thiserror::Error)]
#[error("circuit breaker is open")]
pub struct CircuitOpenError;

/// Tracks consecutive embedding-provider failures and short-circuits calls
/// once the circuit is open.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<State>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Mutex::new(State::Closed {
                consecutive_failures: 0,
            }),
            config,
        }
    }

    /// Returns `Ok(())` if a call should proceed, transitioning
    /// `open -> half_open` when the recovery window has elapsed.
    pub fn allow_request(&self) -> Result<(), CircuitOpenError> {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        match *state {
            State::Closed { .. } => Ok(()),
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.recovery_time {
                    tracing::info!("embedding circuit breaker probing recovery (half_open)");
                    *state = State::HalfOpen {
                        consecutive_successes: 0,
                    };
                    Ok(())
                } else {
                    Err(CircuitOpenError)
                }
            }
            State::HalfOpen { .. } => Ok(()),
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        match *state {
            State::Closed { .. } => {
                *state = State::Closed {
                    consecutive_failures: 0,
                };
            }
            State::HalfOpen {
                consecutive_successes,
            } => {
                let successes = consecutive_successes + 1;
                if successes >= self.config.half_open_successes {
                    tracing::info!("embedding circuit breaker closing after recovery");
                    *state = State::Closed {
                        consecutive_failures: 0,
                    };
                } else {
                    *state = State::HalfOpen {
                        consecutive_successes: successes,
                    };
                }
            }
            State::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("circuit breaker lock poisoned");
        match *state {
            State::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    tracing::warn!(failures, "embedding circuit breaker opening");
                    *state = State::Open {
                        opened_at: Instant::now(),
                    };
                } else {
                    *state = State::Closed {
                        consecutive_failures: failures,
                    };
                }
            }
            State::HalfOpen { .. } => {
                tracing::warn!("embedding circuit breaker reopening, recovery probe failed");
                *state = State::Open {
                    opened_at: Instant::now(),
                };
            }
            State::Open { .. } => {}
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        match *self.state.lock().expect("circuit breaker lock poisoned") {
            State::Closed { .. } => CircuitState::Closed,
            State::Open { .. } => CircuitState::Open,
            State::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

/// Decorates a primary provider with a [`CircuitBreaker`] and a deterministic
/// fallback. `embed` never fails: a primary failure or open circuit silently
/// returns the fallback vector, trading retrieval quality for ingest
/// availability.
pub struct CircuitBreakerEmbeddingProvider {
    primary: Box<dyn EmbeddingProvider>,
    fallback: super::deterministic::DeterministicProvider,
    breaker: CircuitBreaker,
}

impl CircuitBreakerEmbeddingProvider {
    #[must_use]
    pub fn new(primary: Box<dyn EmbeddingProvider>, config: CircuitBreakerConfig) -> Self {
        let dimension = primary.embedding_dimension();
        Self {
            primary,
            fallback: super::deterministic::DeterministicProvider::new(dimension),
            breaker: CircuitBreaker::new(config),
        }
    }

    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }
}

#[async_trait]
impl EmbeddingProvider for CircuitBreakerEmbeddingProvider {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if self.breaker.allow_request().is_err() {
            tracing::warn!("embedding circuit open, using fallback vector");
            return self.fallback.embed(text).await;
        }

        match self.primary.embed(text).await {
            Ok(vector) => {
                self.breaker.record_success();
                Ok(vector)
            }
            Err(err) => {
                self.breaker.record_failure();
                tracing::warn!(error = %err, "primary embedding provider failed, using fallback");
                self.fallback.embed(text).await
            }
        }
    }

    fn embedding_dimension(&self) -> usize {
        self.primary.embedding_dimension()
    }

    fn name(&self) -> &str {
        self.primary.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::provider::test_support::FlakyProvider;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn opens_after_threshold_and_recovers() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            half_open_successes: 1,
            recovery_time: Duration::from_millis(0),
        });

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.allow_request().is_err());

        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.allow_request().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn decorator_falls_back_on_primary_failure() {
        let primary = Box::new(FlakyProvider {
            dimension: 4,
            calls: AtomicUsize::new(0),
            fail_count: 100,
        });
        let decorated = CircuitBreakerEmbeddingProvider::new(
            primary,
            CircuitBreakerConfig {
                failure_threshold: 1,
                half_open_successes: 1,
                recovery_time: Duration::from_secs(30),
            },
        );

        let vector = decorated.embed("hello").await.unwrap();
        assert_eq!(vector.len(), 4);
        assert_eq!(decorated.state(), CircuitState::Open);
    }
}
