//! Durable embedding job queue: enqueue, claim-with-lease, ack/fail, reclaim.

use chrono::Utc;
use memory_core::store::{ClaimParams, JobOutcome, Tx};
use memory_core::{EmbeddingJob, Error, JobStatus, Result};
use uuid::Uuid;

use crate::rows::{row_to_job, to_epoch_millis};
use crate::SqliteStorage;

impl SqliteStorage {
    pub(crate) async fn enqueue_embedding_job_impl(
        &self,
        tx: &mut Tx,
        message_id: Uuid,
    ) -> Result<EmbeddingJob> {
        let conn = Self::conn(tx)?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            r#"
            INSERT INTO embedding_jobs (id, message_id, status, attempts, last_error, updated_at)
            VALUES (?, ?, 'pending', 0, NULL, ?)
            "#,
            libsql::params![id.to_string(), message_id.to_string(), to_epoch_millis(now)],
        )
        .await
        .map_err(|e| Error::Store(format!("failed to enqueue embedding job: {e}")))?;

        Ok(EmbeddingJob {
            id,
            message_id,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            updated_at: now,
        })
    }

    /// Claim up to `params.limit` pending/retryable jobs and bump each to
    /// `running`. libSQL has no `SELECT ... FOR UPDATE SKIP LOCKED`; the
    /// surrounding `tx` (a real `BEGIN`/`COMMIT` transaction on this
    /// connection) plus the single-writer nature of an embedded database is
    /// what keeps two claimers from handing out the same row — a real
    /// multi-writer deployment would need a backend that supports row
    /// locking for this to stay correct under concurrent claimers.
    pub(crate) async fn claim_embedding_jobs_impl(
        &self,
        tx: &mut Tx,
        params: ClaimParams,
    ) -> Result<Vec<EmbeddingJob>> {
        let conn = Self::conn(tx)?;
        let now = Utc::now();
        let retry_cutoff = to_epoch_millis(now - chrono::Duration::seconds(params.retry_backoff_seconds));

        let mut rows = conn
            .query(
                r#"
                SELECT id, message_id, status, attempts, last_error, updated_at
                FROM embedding_jobs
                WHERE (status = 'pending' OR (status = 'failed' AND attempts < ? AND updated_at <= ?))
                ORDER BY updated_at ASC
                LIMIT ?
                "#,
                libsql::params![i64::from(params.max_attempts), retry_cutoff, i64::from(params.limit)],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to select claimable jobs: {e}")))?;

        let mut candidates = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Store(format!("failed to fetch job row: {e}")))?
        {
            candidates.push(row_to_job(&row)?);
        }

        let mut claimed = Vec::with_capacity(candidates.len());
        for job in candidates {
            conn.execute(
                "UPDATE embedding_jobs SET status = 'running', attempts = attempts + 1, updated_at = ? WHERE id = ?",
                libsql::params![to_epoch_millis(now), job.id.to_string()],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to claim job {}: {e}", job.id)))?;

            claimed.push(EmbeddingJob {
                status: JobStatus::Running,
                attempts: job.attempts + 1,
                updated_at: now,
                ..job
            });
        }
        Ok(claimed)
    }

    pub(crate) async fn update_embedding_job_impl(
        &self,
        tx: &mut Tx,
        job_id: Uuid,
        outcome: JobOutcome,
    ) -> Result<()> {
        let conn = Self::conn(tx)?;
        let now = Utc::now();

        match outcome {
            JobOutcome::Completed => {
                conn.execute(
                    "UPDATE embedding_jobs SET status = 'completed', last_error = NULL, updated_at = ? WHERE id = ?",
                    libsql::params![to_epoch_millis(now), job_id.to_string()],
                )
                .await
            }
            JobOutcome::Failed { error } => {
                conn.execute(
                    "UPDATE embedding_jobs SET status = 'failed', last_error = ?, updated_at = ? WHERE id = ?",
                    libsql::params![error, to_epoch_millis(now), job_id.to_string()],
                )
                .await
            }
        }
        .map_err(|e| Error::Store(format!("failed to update job {job_id}: {e}")))?;
        Ok(())
    }

    pub(crate) async fn reclaim_stuck_jobs_impl(
        &self,
        tx: &mut Tx,
        stuck_timeout_seconds: i64,
    ) -> Result<u64> {
        let conn = Self::conn(tx)?;
        let now = Utc::now();
        let cutoff = to_epoch_millis(now - chrono::Duration::seconds(stuck_timeout_seconds));

        let reclaimed = conn
            .execute(
                r#"
                UPDATE embedding_jobs
                SET status = 'failed', last_error = 'reclaimed: stuck in running', updated_at = ?
                WHERE status = 'running' AND updated_at <= ?
                "#,
                libsql::params![to_epoch_millis(now), cutoff],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to reclaim stuck jobs: {e}")))?;

        Ok(reclaimed)
    }
}
