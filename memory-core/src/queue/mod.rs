//! Durable embedding job queue: a single controller task draining
//! [`crate::model::EmbeddingJob`] rows via claim/ack against the
//! [`Repository`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{search_invalidation_prefix, ResultCache};
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::model::EmbeddingStatus;
use crate::store::{ClaimParams, JobOutcome, Repository};

/// Tunables for the controller loop (§6.3 `embedding_job_*` keys).
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub stuck_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 10,
            max_attempts: 3,
            retry_backoff: Duration::from_secs(5),
            stuck_timeout: Duration::from_secs(60),
        }
    }
}

/// Drains [`crate::model::EmbeddingJob`] rows: claim a batch, embed each
/// message, write the result back, invalidate the cache entries it affects.
///
/// `start`/`stop` follow the teacher's controller-task idiom: a single
/// logical claimer (the `batch_size` provides per-cycle parallelism, applied
/// serially here, which satisfies the claim+ack invariant either way) driven
/// by a [`tokio::sync::watch`] stop signal rather than a thread pool.
pub struct EmbeddingJobQueue {
    repository: Arc<dyn Repository>,
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<ResultCache>,
    config: QueueConfig,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl EmbeddingJobQueue {
    #[must_use]
    pub fn new(
        repository: Arc<dyn Repository>,
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<ResultCache>,
        config: QueueConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            repository,
            provider,
            cache,
            config,
            stop_tx,
            stop_rx,
        }
    }

    /// Spawn the controller task. Returns a handle the caller can `.await`
    /// after calling [`Self::stop`].
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.run().await })
    }

    /// Signal the controller to stop after its current in-flight batch.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    async fn run(&self) {
        info!("embedding job queue controller starting");
        let mut stop_rx = self.stop_rx.clone();
        loop {
            if *stop_rx.borrow() {
                break;
            }

            if let Err(err) = self.reclaim_stuck().await {
                warn!(error = %err, "failed to reclaim stuck jobs");
            }

            match self.drain_once().await {
                Ok(0) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = stop_rx.changed() => {}
                    }
                }
                Ok(_) => continue,
                Err(err) => {
                    warn!(error = %err, "embedding job batch failed");
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = stop_rx.changed() => {}
                    }
                }
            }
        }
        info!("embedding job queue controller stopped");
    }

    /// Claim and process a single batch; returns the number of jobs
    /// processed. Exposed directly for tests and for the synchronous
    /// ingest-mode scenario in the spec's "drain once" test contract.
    #[instrument(skip(self))]
    pub async fn drain_once(&self) -> Result<usize> {
        let mut tx = self.repository.begin().await?;
        let jobs = self
            .repository
            .claim_embedding_jobs(
                &mut tx,
                ClaimParams {
                    limit: self.config.batch_size,
                    max_attempts: self.config.max_attempts,
                    retry_backoff_seconds: self.config.retry_backoff.as_secs() as i64,
                },
            )
            .await?;
        self.repository.commit(tx).await?;

        let count = jobs.len();
        for job in jobs {
            self.process(job.id, job.message_id).await;
        }
        Ok(count)
    }

    async fn reclaim_stuck(&self) -> Result<()> {
        let mut tx = self.repository.begin().await?;
        let reclaimed = self
            .repository
            .reclaim_stuck_jobs(&mut tx, self.config.stuck_timeout.as_secs() as i64)
            .await?;
        self.repository.commit(tx).await?;
        if reclaimed > 0 {
            debug!(reclaimed, "reclaimed stuck embedding jobs");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn process(&self, job_id: Uuid, message_id: Uuid) {
        let mut tx = match self.repository.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                warn!(error = %err, "failed to open transaction for job");
                return;
            }
        };

        let message = match self.repository.get_message(&mut tx, message_id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                let _ = self
                    .repository
                    .update_embedding_job(
                        &mut tx,
                        job_id,
                        JobOutcome::Failed {
                            error: "message_missing".to_string(),
                        },
                    )
                    .await;
                let _ = self.repository.commit(tx).await;
                return;
            }
            Err(err) => {
                let _ = self.repository.rollback(tx).await;
                warn!(error = %err, "failed to load message for job");
                return;
            }
        };

        match self.provider.embed(&message.content).await {
            Ok(embedding) => {
                let importance = message.importance_score;
                if let Err(err) = self
                    .repository
                    .update_message_embedding(
                        &mut tx,
                        message.id,
                        Some(embedding),
                        importance,
                        EmbeddingStatus::Completed,
                    )
                    .await
                {
                    let _ = self.repository.rollback(tx).await;
                    warn!(error = %err, "failed to persist embedding");
                    return;
                }
                if let Err(err) = self
                    .repository
                    .update_embedding_job(&mut tx, job_id, JobOutcome::Completed)
                    .await
                {
                    let _ = self.repository.rollback(tx).await;
                    warn!(error = %err, "failed to mark job completed");
                    return;
                }
                if let Err(err) = self.repository.commit(tx).await {
                    warn!(error = %err, "failed to commit completed job");
                    return;
                }
                self.cache.delete_prefix(&search_invalidation_prefix(
                    &message.tenant_id,
                    &message.conversation_id,
                ));
            }
            Err(err) => {
                let outcome = JobOutcome::Failed {
                    error: err.to_string(),
                };
                if let Err(update_err) = self
                    .repository
                    .update_embedding_job(&mut tx, job_id, outcome)
                    .await
                {
                    let _ = self.repository.rollback(tx).await;
                    warn!(error = %update_err, "failed to record job failure");
                    return;
                }
                let _ = self.repository.commit(tx).await;
            }
        }
    }
}
