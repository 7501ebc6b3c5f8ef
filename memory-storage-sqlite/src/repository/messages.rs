//! Message CRUD, active-message listing and native similarity search.

use chrono::Utc;
use memory_core::store::{ActiveMessageFilter, NewMessage, SimilarityCandidate};
use memory_core::{Error, Message, Result};
use uuid::Uuid;

use crate::rows::{embedding_to_blob, row_to_message, to_epoch_millis};
use crate::SqliteStorage;

impl SqliteStorage {
    pub(crate) async fn create_message_impl(
        &self,
        tx: &mut memory_core::store::Tx,
        new: NewMessage,
    ) -> Result<Message> {
        let conn = Self::conn(tx)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let metadata_json = serde_json::to_string(new.metadata.as_value())?;

        conn.execute(
            r#"
            INSERT INTO messages (
                id, tenant_id, conversation_id, role, content, metadata,
                importance_score, embedding, embedding_status, created_at, updated_at, archived
            ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, 'pending', ?, ?, 0)
            "#,
            libsql::params![
                id.to_string(),
                new.tenant_id.clone(),
                new.conversation_id.clone(),
                new.role.to_string(),
                new.content.clone(),
                metadata_json,
                new.importance_score.map(f64::from),
                to_epoch_millis(now),
                to_epoch_millis(now),
            ],
        )
        .await
        .map_err(|e| Error::Store(format!("failed to insert message: {e}")))?;

        Ok(Message {
            id,
            tenant_id: new.tenant_id,
            conversation_id: new.conversation_id,
            role: new.role,
            content: new.content,
            metadata: new.metadata,
            importance_score: new.importance_score,
            embedding: None,
            embedding_status: memory_core::EmbeddingStatus::Pending,
            created_at: now,
            updated_at: now,
            archived: false,
        })
    }

    pub(crate) async fn get_message_impl(
        &self,
        tx: &mut memory_core::store::Tx,
        id: Uuid,
    ) -> Result<Option<Message>> {
        let conn = Self::conn(tx)?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, tenant_id, conversation_id, role, content, metadata,
                       importance_score, embedding, embedding_status, created_at, updated_at, archived
                FROM messages WHERE id = ?
                "#,
                libsql::params![id.to_string()],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to query message {id}: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| Error::Store(format!("failed to fetch message row: {e}")))?
        {
            Some(row) => Ok(Some(row_to_message(&row)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn update_message_embedding_impl(
        &self,
        tx: &mut memory_core::store::Tx,
        id: Uuid,
        embedding: Option<Vec<f32>>,
        importance: Option<f32>,
        status: memory_core::EmbeddingStatus,
    ) -> Result<Option<Message>> {
        let conn = Self::conn(tx)?;
        let now = Utc::now();
        let blob = embedding.as_deref().map(embedding_to_blob);

        let changed = conn
            .execute(
                r#"
                UPDATE messages
                SET embedding = ?, importance_score = COALESCE(?, importance_score),
                    embedding_status = ?, updated_at = ?
                WHERE id = ?
                "#,
                libsql::params![
                    blob,
                    importance.map(f64::from),
                    status.to_string(),
                    to_epoch_millis(now),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to update message {id}: {e}")))?;

        if changed == 0 {
            return Ok(None);
        }
        self.get_message_impl(tx, id).await
    }

    pub(crate) async fn list_active_messages_impl(
        &self,
        tx: &mut memory_core::store::Tx,
        tenant_id: &str,
        filter: &ActiveMessageFilter,
    ) -> Result<Vec<Message>> {
        let conn = Self::conn(tx)?;
        let mut sql = String::from(
            r#"
            SELECT id, tenant_id, conversation_id, role, content, metadata,
                   importance_score, embedding, embedding_status, created_at, updated_at, archived
            FROM messages
            WHERE tenant_id = ? AND archived = 0 AND embedding_status = 'completed'
            "#,
        );
        if filter.conversation_id.is_some() {
            sql.push_str(" AND conversation_id = ?");
        }
        if filter.importance_min.is_some() {
            sql.push_str(" AND importance_score >= ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");

        let mut rows = if let (Some(conv), Some(min)) =
            (&filter.conversation_id, filter.importance_min)
        {
            conn.query(
                &sql,
                libsql::params![tenant_id, conv.clone(), f64::from(min), i64::from(filter.limit)],
            )
            .await
        } else if let Some(conv) = &filter.conversation_id {
            conn.query(&sql, libsql::params![tenant_id, conv.clone(), i64::from(filter.limit)])
                .await
        } else if let Some(min) = filter.importance_min {
            conn.query(&sql, libsql::params![tenant_id, f64::from(min), i64::from(filter.limit)])
                .await
        } else {
            conn.query(&sql, libsql::params![tenant_id, i64::from(filter.limit)])
                .await
        }
        .map_err(|e| Error::Store(format!("failed to list active messages: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Store(format!("failed to fetch message row: {e}")))?
        {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }

    /// libSQL has no native vector index wired up here; retrieval always
    /// falls back to [`Self::list_active_messages_impl`] plus in-memory
    /// ranking. Kept as an explicit `None` rather than omitted so a future
    /// backend with real vector search has a documented seam to fill in.
    pub(crate) async fn search_similar_impl(
        &self,
        _tx: &mut memory_core::store::Tx,
        _tenant_id: &str,
        _filter: &ActiveMessageFilter,
        _query_vec: &[f32],
    ) -> Result<Option<Vec<SimilarityCandidate>>> {
        Ok(None)
    }
}
