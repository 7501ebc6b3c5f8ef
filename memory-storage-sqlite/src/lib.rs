#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

//! libSQL/SQLite backend implementing [`memory_core::store::Repository`].
//!
//! Transactions are real `BEGIN`/`COMMIT`/`ROLLBACK` statements issued on a
//! single connection, stashed behind [`memory_core::store::Tx`]'s
//! type-erased handle (see [`connection::SqliteStorage::conn`]). There is no
//! pooling beyond what `libsql::Database::connect` already does internally;
//! a deployment that needs primary/replica routing should wrap
//! [`SqliteStorage`] rather than grow it, the same way the rest of this
//! crate keeps one concern per type.

mod connection;
mod repository;
mod rows;
pub mod schema;

pub use connection::SqliteStorage;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use memory_core::model::CustomConditions;
    use memory_core::store::{ActiveMessageFilter, ClaimParams, JobOutcome, NewMessage, Repository};
    use memory_core::{EmbeddingStatus, Role};

    async fn open() -> SqliteStorage {
        let storage = SqliteStorage::open_memory().await.unwrap();
        storage.init_schema().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn create_and_fetch_message_round_trips() {
        let storage = open().await;
        let mut tx = storage.begin().await.unwrap();
        let created = storage
            .create_message(
                &mut tx,
                NewMessage {
                    tenant_id: "tenant-a".into(),
                    conversation_id: "conv-1".into(),
                    role: Role::User,
                    content: "hello there".into(),
                    metadata: memory_core::Metadata::empty(),
                    importance_score: Some(0.4),
                },
            )
            .await
            .unwrap();
        storage.commit(tx).await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        let fetched = storage.get_message(&mut tx, created.id).await.unwrap();
        storage.commit(tx).await.unwrap();

        assert_eq!(fetched.unwrap().content, "hello there");
    }

    #[tokio::test]
    async fn update_embedding_marks_completed_and_persists_vector() {
        let storage = open().await;
        let mut tx = storage.begin().await.unwrap();
        let created = storage
            .create_message(
                &mut tx,
                NewMessage {
                    tenant_id: "tenant-a".into(),
                    conversation_id: "conv-1".into(),
                    role: Role::User,
                    content: "remember this".into(),
                    metadata: memory_core::Metadata::empty(),
                    importance_score: None,
                },
            )
            .await
            .unwrap();

        let updated = storage
            .update_message_embedding(
                &mut tx,
                created.id,
                Some(vec![0.1, 0.2, 0.3]),
                Some(0.8),
                EmbeddingStatus::Completed,
            )
            .await
            .unwrap()
            .unwrap();
        storage.commit(tx).await.unwrap();

        assert_eq!(updated.embedding, Some(vec![0.1, 0.2, 0.3]));
        assert_eq!(updated.embedding_status, EmbeddingStatus::Completed);
        assert_eq!(updated.importance_score, Some(0.8));
    }

    #[tokio::test]
    async fn list_active_messages_excludes_pending_and_archived() {
        let storage = open().await;
        let mut tx = storage.begin().await.unwrap();

        let pending = storage
            .create_message(
                &mut tx,
                NewMessage {
                    tenant_id: "t1".into(),
                    conversation_id: "c1".into(),
                    role: Role::User,
                    content: "pending embed".into(),
                    metadata: memory_core::Metadata::empty(),
                    importance_score: None,
                },
            )
            .await
            .unwrap();

        let active = storage
            .create_message(
                &mut tx,
                NewMessage {
                    tenant_id: "t1".into(),
                    conversation_id: "c1".into(),
                    role: Role::User,
                    content: "embedded already".into(),
                    metadata: memory_core::Metadata::empty(),
                    importance_score: Some(0.5),
                },
            )
            .await
            .unwrap();
        storage
            .update_message_embedding(&mut tx, active.id, Some(vec![1.0]), Some(0.5), EmbeddingStatus::Completed)
            .await
            .unwrap();

        let _ = pending;
        storage.commit(tx).await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        let results = storage
            .list_active_messages(&mut tx, "t1", &ActiveMessageFilter { limit: 10, ..Default::default() })
            .await
            .unwrap();
        storage.commit(tx).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, active.id);
    }

    #[tokio::test]
    async fn job_queue_claim_then_ack_round_trips() {
        let storage = open().await;
        let mut tx = storage.begin().await.unwrap();
        let message = storage
            .create_message(
                &mut tx,
                NewMessage {
                    tenant_id: "t1".into(),
                    conversation_id: "c1".into(),
                    role: Role::User,
                    content: "needs embedding".into(),
                    metadata: memory_core::Metadata::empty(),
                    importance_score: None,
                },
            )
            .await
            .unwrap();
        storage.enqueue_embedding_job(&mut tx, message.id).await.unwrap();
        storage.commit(tx).await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        let claimed = storage
            .claim_embedding_jobs(
                &mut tx,
                ClaimParams { limit: 10, max_attempts: 3, retry_backoff_seconds: 5 },
            )
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 1);

        storage.update_embedding_job(&mut tx, claimed[0].id, JobOutcome::Completed).await.unwrap();
        storage.commit(tx).await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        let none_left = storage
            .claim_embedding_jobs(
                &mut tx,
                ClaimParams { limit: 10, max_attempts: 3, retry_backoff_seconds: 5 },
            )
            .await
            .unwrap();
        storage.commit(tx).await.unwrap();
        assert!(none_left.is_empty());
    }

    #[tokio::test]
    async fn delete_messages_cascades_embedding_job() {
        let storage = open().await;
        let mut tx = storage.begin().await.unwrap();
        let message = storage
            .create_message(
                &mut tx,
                NewMessage {
                    tenant_id: "t1".into(),
                    conversation_id: "c1".into(),
                    role: Role::User,
                    content: "to delete".into(),
                    metadata: memory_core::Metadata::empty(),
                    importance_score: None,
                },
            )
            .await
            .unwrap();
        storage.enqueue_embedding_job(&mut tx, message.id).await.unwrap();
        storage.delete_messages(&mut tx, std::slice::from_ref(&message)).await.unwrap();
        storage.commit(tx).await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        let fetched = storage.get_message(&mut tx, message.id).await.unwrap();
        let jobs = storage
            .claim_embedding_jobs(
                &mut tx,
                ClaimParams { limit: 10, max_attempts: 3, retry_backoff_seconds: 0 },
            )
            .await
            .unwrap();
        storage.commit(tx).await.unwrap();

        assert!(fetched.is_none());
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn move_to_archive_then_delete_archived_removes_both_rows() {
        let storage = open().await;
        let mut tx = storage.begin().await.unwrap();
        let message = storage
            .create_message(
                &mut tx,
                NewMessage {
                    tenant_id: "t1".into(),
                    conversation_id: "c1".into(),
                    role: Role::User,
                    content: "to archive".into(),
                    metadata: memory_core::Metadata::empty(),
                    importance_score: Some(0.1),
                },
            )
            .await
            .unwrap();

        let archived_count = storage.move_to_archive(&mut tx, &[message.clone()], "test").await.unwrap();
        assert_eq!(archived_count, 1);

        let deleted_count = storage.delete_archived(&mut tx, "t1", 0).await.unwrap();
        assert_eq!(deleted_count, 1);
        storage.commit(tx).await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        let fetched = storage.get_message(&mut tx, message.id).await.unwrap();
        storage.commit(tx).await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn rule_candidates_custom_filters_by_role_and_importance() {
        let storage = open().await;
        let mut tx = storage.begin().await.unwrap();
        storage
            .create_message(
                &mut tx,
                NewMessage {
                    tenant_id: "t1".into(),
                    conversation_id: "c1".into(),
                    role: Role::System,
                    content: "system note".into(),
                    metadata: memory_core::Metadata::empty(),
                    importance_score: Some(0.1),
                },
            )
            .await
            .unwrap();
        storage
            .create_message(
                &mut tx,
                NewMessage {
                    tenant_id: "t1".into(),
                    conversation_id: "c1".into(),
                    role: Role::User,
                    content: "user note".into(),
                    metadata: memory_core::Metadata::empty(),
                    importance_score: Some(0.9),
                },
            )
            .await
            .unwrap();
        storage.commit(tx).await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        let results = storage
            .rule_candidates_custom(
                &mut tx,
                "t1",
                &CustomConditions { role: Some("system".into()), min_importance: None, max_importance: None },
            )
            .await
            .unwrap();
        storage.commit(tx).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "system note");
    }

    #[tokio::test]
    async fn retention_policy_upsert_overwrites_existing() {
        let storage = open().await;
        let mut tx = storage.begin().await.unwrap();
        storage
            .upsert_retention_policy(
                &mut tx,
                memory_core::RetentionPolicy {
                    tenant_id: "t1".into(),
                    max_age_days: 30,
                    importance_threshold: 0.2,
                    max_items: 1000,
                    delete_after_days: 90,
                },
            )
            .await
            .unwrap();
        storage
            .upsert_retention_policy(
                &mut tx,
                memory_core::RetentionPolicy {
                    tenant_id: "t1".into(),
                    max_age_days: 10,
                    importance_threshold: 0.5,
                    max_items: 500,
                    delete_after_days: 30,
                },
            )
            .await
            .unwrap();
        let loaded = storage.load_policy(&mut tx, "t1").await.unwrap().unwrap();
        storage.commit(tx).await.unwrap();

        assert_eq!(loaded.max_age_days, 10);
        assert_eq!(loaded.max_items, 500);
    }

    #[tokio::test]
    async fn list_tenants_returns_distinct_ids() {
        let storage = open().await;
        let mut tx = storage.begin().await.unwrap();
        for (tenant, conv) in [("t1", "c1"), ("t1", "c2"), ("t2", "c1")] {
            storage
                .create_message(
                    &mut tx,
                    NewMessage {
                        tenant_id: tenant.into(),
                        conversation_id: conv.into(),
                        role: Role::User,
                        content: "hi".into(),
                        metadata: memory_core::Metadata::empty(),
                        importance_score: None,
                    },
                )
                .await
                .unwrap();
        }
        let mut tenants = storage.list_tenants(&mut tx).await.unwrap();
        storage.commit(tx).await.unwrap();
        tenants.sort();
        assert_eq!(tenants, vec!["t1".to_string(), "t2".to_string()]);
    }

    #[tokio::test]
    async fn reclaim_stuck_jobs_resets_long_running_rows() {
        let storage = open().await;
        let mut tx = storage.begin().await.unwrap();
        let message = storage
            .create_message(
                &mut tx,
                NewMessage {
                    tenant_id: "t1".into(),
                    conversation_id: "c1".into(),
                    role: Role::User,
                    content: "slow job".into(),
                    metadata: memory_core::Metadata::empty(),
                    importance_score: None,
                },
            )
            .await
            .unwrap();
        storage.enqueue_embedding_job(&mut tx, message.id).await.unwrap();
        storage
            .claim_embedding_jobs(&mut tx, ClaimParams { limit: 10, max_attempts: 3, retry_backoff_seconds: 5 })
            .await
            .unwrap();

        let reclaimed = storage.reclaim_stuck_jobs(&mut tx, -1).await.unwrap();
        storage.commit(tx).await.unwrap();

        assert_eq!(reclaimed, 1);
        let _ = Utc::now();
    }
}
