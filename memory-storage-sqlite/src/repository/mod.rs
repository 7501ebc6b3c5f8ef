//! [`memory_core::store::Repository`] for [`crate::SqliteStorage`].
//!
//! The actual query logic lives in the per-concern submodules as inherent
//! `*_impl` methods; this file is the mechanical trait wiring so each
//! submodule can be read without the `#[async_trait]` noise.

mod jobs;
mod messages;
mod retention;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memory_core::store::{
    ActiveMessageFilter, ClaimParams, JobOutcome, NewMessage, Repository, SimilarityCandidate, Tx,
};
use memory_core::{EmbeddingJob, Message, Result, RetentionPolicy, RetentionRule};
use uuid::Uuid;

use crate::SqliteStorage;

#[async_trait]
impl Repository for SqliteStorage {
    async fn begin(&self) -> Result<Tx> {
        self.begin_tx().await
    }

    async fn commit(&self, tx: Tx) -> Result<()> {
        self.commit_tx(tx).await
    }

    async fn rollback(&self, tx: Tx) -> Result<()> {
        self.rollback_tx(tx).await
    }

    async fn create_message(&self, tx: &mut Tx, new: NewMessage) -> Result<Message> {
        self.create_message_impl(tx, new).await
    }

    async fn get_message(&self, tx: &mut Tx, id: Uuid) -> Result<Option<Message>> {
        self.get_message_impl(tx, id).await
    }

    async fn update_message_embedding(
        &self,
        tx: &mut Tx,
        id: Uuid,
        embedding: Option<Vec<f32>>,
        importance: Option<f32>,
        status: memory_core::EmbeddingStatus,
    ) -> Result<Option<Message>> {
        self.update_message_embedding_impl(tx, id, embedding, importance, status).await
    }

    async fn list_active_messages(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        filter: &ActiveMessageFilter,
    ) -> Result<Vec<Message>> {
        self.list_active_messages_impl(tx, tenant_id, filter).await
    }

    async fn search_similar(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        filter: &ActiveMessageFilter,
        query_vec: &[f32],
    ) -> Result<Option<Vec<SimilarityCandidate>>> {
        self.search_similar_impl(tx, tenant_id, filter, query_vec).await
    }

    async fn enqueue_embedding_job(&self, tx: &mut Tx, message_id: Uuid) -> Result<EmbeddingJob> {
        self.enqueue_embedding_job_impl(tx, message_id).await
    }

    async fn claim_embedding_jobs(&self, tx: &mut Tx, params: ClaimParams) -> Result<Vec<EmbeddingJob>> {
        self.claim_embedding_jobs_impl(tx, params).await
    }

    async fn update_embedding_job(&self, tx: &mut Tx, job_id: Uuid, outcome: JobOutcome) -> Result<()> {
        self.update_embedding_job_impl(tx, job_id, outcome).await
    }

    async fn reclaim_stuck_jobs(&self, tx: &mut Tx, stuck_timeout_seconds: i64) -> Result<u64> {
        self.reclaim_stuck_jobs_impl(tx, stuck_timeout_seconds).await
    }

    async fn upsert_retention_policy(&self, tx: &mut Tx, policy: RetentionPolicy) -> Result<()> {
        self.upsert_retention_policy_impl(tx, policy).await
    }

    async fn load_policy(&self, tx: &mut Tx, tenant_id: &str) -> Result<Option<RetentionPolicy>> {
        self.load_policy_impl(tx, tenant_id).await
    }

    async fn load_rules(&self, tx: &mut Tx, tenant_id: &str) -> Result<Vec<RetentionRule>> {
        self.load_rules_impl(tx, tenant_id).await
    }

    async fn touch_rule_applied(&self, tx: &mut Tx, rule_id: Uuid, applied_at: DateTime<Utc>) -> Result<()> {
        self.touch_rule_applied_impl(tx, rule_id, applied_at).await
    }

    async fn archive_candidates(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        older_than_days: u32,
        importance_threshold: f32,
    ) -> Result<Vec<Message>> {
        self.archive_candidates_impl(tx, tenant_id, older_than_days, importance_threshold).await
    }

    async fn move_to_archive(&self, tx: &mut Tx, messages: &[Message], reason: &str) -> Result<u64> {
        self.move_to_archive_impl(tx, messages, reason).await
    }

    async fn delete_archived(&self, tx: &mut Tx, tenant_id: &str, older_than_days: u32) -> Result<u64> {
        self.delete_archived_impl(tx, tenant_id, older_than_days).await
    }

    async fn delete_messages(&self, tx: &mut Tx, messages: &[Message]) -> Result<u64> {
        self.delete_messages_impl(tx, messages).await
    }

    async fn list_tenants(&self, tx: &mut Tx) -> Result<Vec<String>> {
        self.list_tenants_impl(tx).await
    }

    async fn rule_candidates_age(&self, tx: &mut Tx, tenant_id: &str, days: u32) -> Result<Vec<Message>> {
        self.rule_candidates_age_impl(tx, tenant_id, days).await
    }

    async fn rule_candidates_importance(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        threshold: f32,
    ) -> Result<Vec<Message>> {
        self.rule_candidates_importance_impl(tx, tenant_id, threshold).await
    }

    async fn rule_candidates_conversation_age(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        days: u32,
    ) -> Result<Vec<Message>> {
        self.rule_candidates_conversation_age_impl(tx, tenant_id, days).await
    }

    async fn rule_candidates_max_items(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        max_items: u32,
    ) -> Result<Vec<Message>> {
        self.rule_candidates_max_items_impl(tx, tenant_id, max_items).await
    }

    async fn rule_candidates_custom(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        conditions: &memory_core::model::CustomConditions,
    ) -> Result<Vec<Message>> {
        self.rule_candidates_custom_impl(tx, tenant_id, conditions).await
    }
}
