//! The [`Repository`] trait: a single transactional surface over the
//! persisted entities (messages, archived messages, embedding jobs,
//! retention policies and rules).
//!
//! There is no ambient session or thread-local transaction context. Callers
//! obtain an explicit [`Tx`] from [`Repository::begin`] and thread it through
//! every call that must participate in the same atomic unit; `Tx` owns
//! nothing about the caller beyond what the backend needs to keep its
//! underlying connection/transaction alive, which it stores type-erased so
//! that `Repository` itself stays object-safe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{EmbeddingJob, Message, RetentionPolicy, RetentionRule};

/// An opaque, backend-owned transaction handle.
///
/// `Repository` implementations stash whatever they need (a `libsql`
/// transaction, a connection checked out of a pool, ...) behind this type so
/// the trait itself never needs an associated type — which would make it
/// impossible to hold as `Arc<dyn Repository>`. Handlers own a `Tx`'s
/// lifetime: they call [`Repository::begin`], pass `&mut tx` through one or
/// more calls, then [`Repository::commit`] or [`Repository::rollback`] it.
pub struct Tx(Box<dyn std::any::Any + Send>);

impl Tx {
    /// Wrap a backend-specific transaction value.
    #[must_use]
    pub fn new<T: Send + 'static>(inner: T) -> Self {
        Tx(Box::new(inner))
    }

    /// Borrow the backend-specific value, or `None` if this `Tx` was built
    /// by a different backend than the one asking.
    #[must_use]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut()
    }

    /// Borrow the backend-specific value immutably.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl std::fmt::Debug for Tx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Tx(..)")
    }
}

/// Payload accepted by [`Repository::create_message`].
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub tenant_id: String,
    pub conversation_id: String,
    pub role: crate::model::Role,
    pub content: String,
    pub metadata: crate::model::Metadata,
    pub importance_score: Option<f32>,
}

/// Filters accepted by [`Repository::list_active_messages`] and
/// [`Repository::search_similar`].
#[derive(Debug, Clone, Default)]
pub struct ActiveMessageFilter {
    pub conversation_id: Option<String>,
    pub importance_min: Option<f32>,
    pub limit: u32,
}

/// A candidate returned by [`Repository::search_similar`] when the backend
/// can compute vector distance natively.
#[derive(Debug, Clone)]
pub struct SimilarityCandidate {
    pub message: Message,
    pub distance: f32,
}

/// Parameters for [`Repository::claim_embedding_jobs`].
#[derive(Debug, Clone, Copy)]
pub struct ClaimParams {
    pub limit: u32,
    pub max_attempts: u32,
    pub retry_backoff_seconds: i64,
}

/// Outcome recorded by [`Repository::update_embedding_job`].
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed,
    Failed { error: String },
}

/// Single transactional surface over the persisted entities.
///
/// Implementations must roll back `tx` on any driver error rather than
/// swallowing it; the repository itself never retries (that policy lives in
/// [`crate::retry`], used internally by backends around individual driver
/// calls, not around whole business transactions).
#[async_trait]
pub trait Repository: Send + Sync {
    /// Begin a new transaction. Every other method on this trait takes the
    /// resulting handle by `&mut` reference.
    async fn begin(&self) -> Result<Tx>;

    /// Commit a transaction previously obtained from [`Self::begin`].
    async fn commit(&self, tx: Tx) -> Result<()>;

    /// Roll back a transaction previously obtained from [`Self::begin`].
    async fn rollback(&self, tx: Tx) -> Result<()>;

    /// Insert a new message with `embedding_status=pending`. Returns the
    /// persisted row including the server-assigned `id` and `created_at`.
    async fn create_message(&self, tx: &mut Tx, new: NewMessage) -> Result<Message>;

    /// Fetch a single message by id, irrespective of archived state.
    async fn get_message(&self, tx: &mut Tx, id: Uuid) -> Result<Option<Message>>;

    /// Atomically update a message's embedding, importance and embedding
    /// status. Returns `None` if the row no longer exists.
    async fn update_message_embedding(
        &self,
        tx: &mut Tx,
        id: Uuid,
        embedding: Option<Vec<f32>>,
        importance: Option<f32>,
        status: crate::model::EmbeddingStatus,
    ) -> Result<Option<Message>>;

    /// Active (`archived=false`, `embedding_status=completed`) messages for a
    /// tenant, newest first, capped at `filter.limit`.
    async fn list_active_messages(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        filter: &ActiveMessageFilter,
    ) -> Result<Vec<Message>>;

    /// Native vector-distance search, when the backend supports it. Returns
    /// `None` when the backend has no vector capability so the caller falls
    /// back to in-memory ranking over [`Self::list_active_messages`].
    async fn search_similar(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        filter: &ActiveMessageFilter,
        query_vec: &[f32],
    ) -> Result<Option<Vec<SimilarityCandidate>>>;

    /// Enqueue a durable embedding job for `message_id`.
    async fn enqueue_embedding_job(&self, tx: &mut Tx, message_id: Uuid) -> Result<EmbeddingJob>;

    /// Atomically claim up to `params.limit` pending/retryable jobs,
    /// transitioning each to `running` with `attempts += 1`. Must be safe
    /// against concurrent claimers: no job is ever handed to two callers.
    async fn claim_embedding_jobs(
        &self,
        tx: &mut Tx,
        params: ClaimParams,
    ) -> Result<Vec<EmbeddingJob>>;

    /// Transition a job to a terminal-for-this-attempt state. Tolerates a
    /// missing row (the message, and hence the job, may have been deleted).
    async fn update_embedding_job(
        &self,
        tx: &mut Tx,
        job_id: Uuid,
        outcome: JobOutcome,
    ) -> Result<()>;

    /// Re-claim jobs stuck `running` past `stuck_timeout_seconds`, resetting
    /// them as if failed so they re-enter the retry window.
    async fn reclaim_stuck_jobs(&self, tx: &mut Tx, stuck_timeout_seconds: i64) -> Result<u64>;

    /// Insert or replace the tenant's retention policy.
    async fn upsert_retention_policy(&self, tx: &mut Tx, policy: RetentionPolicy) -> Result<()>;

    /// Load a tenant's retention policy, if one has been set.
    async fn load_policy(&self, tx: &mut Tx, tenant_id: &str) -> Result<Option<RetentionPolicy>>;

    /// Load a tenant's retention rules, enabled or not, ascending by
    /// priority.
    async fn load_rules(&self, tx: &mut Tx, tenant_id: &str) -> Result<Vec<RetentionRule>>;

    /// Persist `rule.last_applied`.
    async fn touch_rule_applied(&self, tx: &mut Tx, rule_id: Uuid, applied_at: DateTime<Utc>) -> Result<()>;

    /// Candidates for archival under the tenant's default policy:
    /// `archived=false ∧ (importance ≤ threshold ∨ created_at ≤ now − older_than_days)`.
    async fn archive_candidates(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        older_than_days: u32,
        importance_threshold: f32,
    ) -> Result<Vec<Message>>;

    /// Archive `messages`: insert an `ArchivedMessage` twin (skipped if one
    /// already exists) and flip `archived=true`. Returns the count actually
    /// newly archived. Idempotent on retry.
    async fn move_to_archive(&self, tx: &mut Tx, messages: &[Message], reason: &str) -> Result<u64>;

    /// Hard-delete archived rows older than `older_than_days` (by
    /// `archived_at`). Returns the count deleted.
    async fn delete_archived(&self, tx: &mut Tx, tenant_id: &str, older_than_days: u32) -> Result<u64>;

    /// Hard-delete live `messages` rows directly (used by a rule's
    /// `delete` action, which bypasses the archive twin entirely). Cascades
    /// to any non-terminal embedding job for each message. Returns the
    /// count deleted.
    async fn delete_messages(&self, tx: &mut Tx, messages: &[Message]) -> Result<u64>;

    /// Distinct tenants observed in `messages`.
    async fn list_tenants(&self, tx: &mut Tx) -> Result<Vec<String>>;

    /// Candidates for a [`crate::model::RuleType::Age`] rule:
    /// `archived=false ∧ created_at ≤ now − days`.
    async fn rule_candidates_age(&self, tx: &mut Tx, tenant_id: &str, days: u32) -> Result<Vec<Message>>;

    /// Candidates for a [`crate::model::RuleType::Importance`] rule:
    /// `archived=false ∧ (importance_score ≤ threshold ∨ importance_score is null)`.
    async fn rule_candidates_importance(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        threshold: f32,
    ) -> Result<Vec<Message>>;

    /// Candidates for a [`crate::model::RuleType::ConversationAge`] rule:
    /// messages in conversations whose most recent message is older than
    /// `days` (or the conversation has no recent activity).
    async fn rule_candidates_conversation_age(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        days: u32,
    ) -> Result<Vec<Message>>;

    /// Candidates for a [`crate::model::RuleType::MaxItems`] rule: the
    /// oldest `(active_count − max_items)` messages, or empty if under the
    /// cap.
    async fn rule_candidates_max_items(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        max_items: u32,
    ) -> Result<Vec<Message>>;

    /// Candidates for a [`crate::model::RuleType::Custom`] rule: an
    /// optional subset of `{role, min_importance, max_importance}`.
    async fn rule_candidates_custom(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        conditions: &crate::model::CustomConditions,
    ) -> Result<Vec<Message>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_downcast_round_trips() {
        let mut tx = Tx::new(42u32);
        assert_eq!(tx.downcast_ref::<u32>(), Some(&42));
        *tx.downcast_mut::<u32>().unwrap() = 7;
        assert_eq!(tx.downcast_ref::<u32>(), Some(&7));
        assert_eq!(tx.downcast_ref::<i64>(), None);
    }
}
