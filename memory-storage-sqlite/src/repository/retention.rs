//! Retention policy/rule CRUD, rule candidate queries and the
//! archive/delete mechanics the lifecycle engine drives.

use chrono::{DateTime, Utc};
use memory_core::model::CustomConditions;
use memory_core::store::Tx;
use memory_core::{Error, Message, Result, RetentionPolicy, RetentionRule};
use uuid::Uuid;

use crate::rows::{row_to_message, row_to_policy, row_to_rule, to_epoch_millis};
use crate::SqliteStorage;

impl SqliteStorage {
    pub(crate) async fn upsert_retention_policy_impl(
        &self,
        tx: &mut Tx,
        policy: RetentionPolicy,
    ) -> Result<()> {
        let conn = Self::conn(tx)?;
        conn.execute(
            r#"
            INSERT INTO retention_policies
                (tenant_id, max_age_days, importance_threshold, max_items, delete_after_days)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(tenant_id) DO UPDATE SET
                max_age_days = excluded.max_age_days,
                importance_threshold = excluded.importance_threshold,
                max_items = excluded.max_items,
                delete_after_days = excluded.delete_after_days
            "#,
            libsql::params![
                policy.tenant_id,
                i64::from(policy.max_age_days),
                f64::from(policy.importance_threshold),
                i64::from(policy.max_items),
                i64::from(policy.delete_after_days),
            ],
        )
        .await
        .map_err(|e| Error::Store(format!("failed to upsert retention policy: {e}")))?;
        Ok(())
    }

    pub(crate) async fn load_policy_impl(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
    ) -> Result<Option<RetentionPolicy>> {
        let conn = Self::conn(tx)?;
        let mut rows = conn
            .query(
                "SELECT tenant_id, max_age_days, importance_threshold, max_items, delete_after_days \
                 FROM retention_policies WHERE tenant_id = ?",
                libsql::params![tenant_id],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to load retention policy: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| Error::Store(format!("failed to fetch policy row: {e}")))?
        {
            Some(row) => Ok(Some(row_to_policy(&row)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn load_rules_impl(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
    ) -> Result<Vec<RetentionRule>> {
        let conn = Self::conn(tx)?;
        let mut rows = conn
            .query(
                "SELECT id, tenant_id, name, rule_type, conditions, action, priority, enabled, last_applied \
                 FROM retention_rules WHERE tenant_id = ? ORDER BY priority ASC",
                libsql::params![tenant_id],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to load retention rules: {e}")))?;

        let mut rules = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Store(format!("failed to fetch rule row: {e}")))?
        {
            rules.push(row_to_rule(&row)?);
        }
        Ok(rules)
    }

    pub(crate) async fn touch_rule_applied_impl(
        &self,
        tx: &mut Tx,
        rule_id: Uuid,
        applied_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = Self::conn(tx)?;
        conn.execute(
            "UPDATE retention_rules SET last_applied = ? WHERE id = ?",
            libsql::params![to_epoch_millis(applied_at), rule_id.to_string()],
        )
        .await
        .map_err(|e| Error::Store(format!("failed to touch rule {rule_id}: {e}")))?;
        Ok(())
    }

    pub(crate) async fn archive_candidates_impl(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        older_than_days: u32,
        importance_threshold: f32,
    ) -> Result<Vec<Message>> {
        let conn = Self::conn(tx)?;
        let cutoff = to_epoch_millis(Utc::now() - chrono::Duration::days(i64::from(older_than_days)));

        let mut rows = conn
            .query(
                r#"
                SELECT id, tenant_id, conversation_id, role, content, metadata,
                       importance_score, embedding, embedding_status, created_at, updated_at, archived
                FROM messages
                WHERE tenant_id = ? AND archived = 0
                  AND (COALESCE(importance_score, 0) <= ? OR created_at <= ?)
                "#,
                libsql::params![tenant_id, f64::from(importance_threshold), cutoff],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to select archive candidates: {e}")))?;

        collect_messages(rows).await
    }

    pub(crate) async fn move_to_archive_impl(
        &self,
        tx: &mut Tx,
        messages: &[Message],
        reason: &str,
    ) -> Result<u64> {
        let conn = Self::conn(tx)?;
        let now = Utc::now();
        let mut archived = 0u64;

        for message in messages {
            let already = conn
                .query(
                    "SELECT 1 FROM archived_messages WHERE id = ?",
                    libsql::params![message.id.to_string()],
                )
                .await
                .map_err(|e| Error::Store(format!("failed to check archive twin: {e}")))?
                .next()
                .await
                .map_err(|e| Error::Store(format!("failed to fetch archive twin row: {e}")))?
                .is_some();

            if !already {
                let metadata_json = serde_json::to_string(message.metadata.as_value())?;
                conn.execute(
                    r#"
                    INSERT INTO archived_messages
                        (id, tenant_id, conversation_id, role, content, metadata,
                         importance_score, created_at, archived_at, archive_reason)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    libsql::params![
                        message.id.to_string(),
                        message.tenant_id.clone(),
                        message.conversation_id.clone(),
                        message.role.to_string(),
                        message.content.clone(),
                        metadata_json,
                        message.importance_score.map(f64::from),
                        to_epoch_millis(message.created_at),
                        to_epoch_millis(now),
                        reason,
                    ],
                )
                .await
                .map_err(|e| Error::Store(format!("failed to insert archive twin: {e}")))?;
            }

            let changed = conn
                .execute(
                    "UPDATE messages SET archived = 1, updated_at = ? WHERE id = ? AND archived = 0",
                    libsql::params![to_epoch_millis(now), message.id.to_string()],
                )
                .await
                .map_err(|e| Error::Store(format!("failed to flip archived flag: {e}")))?;
            archived += changed;
        }

        Ok(archived)
    }

    pub(crate) async fn delete_archived_impl(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        older_than_days: u32,
    ) -> Result<u64> {
        let conn = Self::conn(tx)?;
        let cutoff = to_epoch_millis(Utc::now() - chrono::Duration::days(i64::from(older_than_days)));

        let ids: Vec<String> = {
            let mut rows = conn
                .query(
                    "SELECT id FROM archived_messages WHERE tenant_id = ? AND archived_at <= ?",
                    libsql::params![tenant_id, cutoff],
                )
                .await
                .map_err(|e| Error::Store(format!("failed to select archived rows to delete: {e}")))?;
            let mut ids = Vec::new();
            while let Some(row) = rows
                .next()
                .await
                .map_err(|e| Error::Store(format!("failed to fetch archived id row: {e}")))?
            {
                let id: String = row.get(0).map_err(|e| Error::Store(e.to_string()))?;
                ids.push(id);
            }
            ids
        };

        let mut deleted = 0u64;
        for id in ids {
            conn.execute(
                "DELETE FROM archived_messages WHERE id = ?",
                libsql::params![id.clone()],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to delete archived row: {e}")))?;
            conn.execute("DELETE FROM messages WHERE id = ?", libsql::params![id.clone()])
                .await
                .map_err(|e| Error::Store(format!("failed to delete archived message twin: {e}")))?;
            conn.execute(
                "DELETE FROM embedding_jobs WHERE message_id = ?",
                libsql::params![id],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to cascade-delete embedding job: {e}")))?;
            deleted += 1;
        }
        Ok(deleted)
    }

    pub(crate) async fn delete_messages_impl(&self, tx: &mut Tx, messages: &[Message]) -> Result<u64> {
        let conn = Self::conn(tx)?;
        let mut deleted = 0u64;
        for message in messages {
            let changed = conn
                .execute(
                    "DELETE FROM messages WHERE id = ?",
                    libsql::params![message.id.to_string()],
                )
                .await
                .map_err(|e| Error::Store(format!("failed to delete message {}: {e}", message.id)))?;
            conn.execute(
                "DELETE FROM embedding_jobs WHERE message_id = ?",
                libsql::params![message.id.to_string()],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to cascade-delete embedding job: {e}")))?;
            deleted += changed;
        }
        Ok(deleted)
    }

    pub(crate) async fn list_tenants_impl(&self, tx: &mut Tx) -> Result<Vec<String>> {
        let conn = Self::conn(tx)?;
        let mut rows = conn
            .query("SELECT DISTINCT tenant_id FROM messages", ())
            .await
            .map_err(|e| Error::Store(format!("failed to list tenants: {e}")))?;

        let mut tenants = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::Store(format!("failed to fetch tenant row: {e}")))?
        {
            let tenant: String = row.get(0).map_err(|e| Error::Store(e.to_string()))?;
            tenants.push(tenant);
        }
        Ok(tenants)
    }

    pub(crate) async fn rule_candidates_age_impl(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        days: u32,
    ) -> Result<Vec<Message>> {
        let conn = Self::conn(tx)?;
        let cutoff = to_epoch_millis(Utc::now() - chrono::Duration::days(i64::from(days)));
        let rows = conn
            .query(
                &format!("{} AND created_at <= ?", ACTIVE_MESSAGES_SELECT),
                libsql::params![tenant_id, cutoff],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to select age-rule candidates: {e}")))?;
        collect_messages(rows).await
    }

    pub(crate) async fn rule_candidates_importance_impl(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        threshold: f32,
    ) -> Result<Vec<Message>> {
        let conn = Self::conn(tx)?;
        let rows = conn
            .query(
                &format!("{} AND COALESCE(importance_score, 0) <= ?", ACTIVE_MESSAGES_SELECT),
                libsql::params![tenant_id, f64::from(threshold)],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to select importance-rule candidates: {e}")))?;
        collect_messages(rows).await
    }

    pub(crate) async fn rule_candidates_conversation_age_impl(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        days: u32,
    ) -> Result<Vec<Message>> {
        let conn = Self::conn(tx)?;
        let cutoff = to_epoch_millis(Utc::now() - chrono::Duration::days(i64::from(days)));
        let rows = conn
            .query(
                r#"
                SELECT m.id, m.tenant_id, m.conversation_id, m.role, m.content, m.metadata,
                       m.importance_score, m.embedding, m.embedding_status, m.created_at, m.updated_at, m.archived
                FROM messages m
                WHERE m.tenant_id = ? AND m.archived = 0
                  AND m.conversation_id IN (
                      SELECT conversation_id FROM messages
                      WHERE tenant_id = ?
                      GROUP BY conversation_id
                      HAVING MAX(created_at) <= ?
                  )
                "#,
                libsql::params![tenant_id, tenant_id, cutoff],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to select conversation-age candidates: {e}")))?;
        collect_messages(rows).await
    }

    pub(crate) async fn rule_candidates_max_items_impl(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        max_items: u32,
    ) -> Result<Vec<Message>> {
        let conn = Self::conn(tx)?;
        let total: i64 = {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM messages WHERE tenant_id = ? AND archived = 0",
                    libsql::params![tenant_id],
                )
                .await
                .map_err(|e| Error::Store(format!("failed to count active messages: {e}")))?;
            let row = rows
                .next()
                .await
                .map_err(|e| Error::Store(format!("failed to fetch count row: {e}")))?
                .ok_or_else(|| Error::Internal("COUNT(*) returned no row".to_string()))?;
            row.get(0).map_err(|e| Error::Store(e.to_string()))?
        };

        let overflow = total - i64::from(max_items);
        if overflow <= 0 {
            return Ok(Vec::new());
        }

        let rows = conn
            .query(
                &format!("{} ORDER BY created_at ASC LIMIT ?", ACTIVE_MESSAGES_SELECT),
                libsql::params![tenant_id, overflow],
            )
            .await
            .map_err(|e| Error::Store(format!("failed to select max-items candidates: {e}")))?;
        collect_messages(rows).await
    }

    pub(crate) async fn rule_candidates_custom_impl(
        &self,
        tx: &mut Tx,
        tenant_id: &str,
        conditions: &CustomConditions,
    ) -> Result<Vec<Message>> {
        let conn = Self::conn(tx)?;
        let mut sql = ACTIVE_MESSAGES_SELECT.to_string();
        let mut clauses = Vec::new();
        if conditions.role.is_some() {
            clauses.push("role = ?".to_string());
        }
        if conditions.min_importance.is_some() {
            clauses.push("COALESCE(importance_score, 0) >= ?".to_string());
        }
        if conditions.max_importance.is_some() {
            clauses.push("COALESCE(importance_score, 0) <= ?".to_string());
        }
        for clause in &clauses {
            sql.push_str(" AND ");
            sql.push_str(clause);
        }

        let mut params: Vec<libsql::Value> = vec![libsql::Value::Text(tenant_id.to_string())];
        if let Some(role) = &conditions.role {
            params.push(libsql::Value::Text(role.clone()));
        }
        if let Some(min) = conditions.min_importance {
            params.push(libsql::Value::Real(f64::from(min)));
        }
        if let Some(max) = conditions.max_importance {
            params.push(libsql::Value::Real(f64::from(max)));
        }

        let rows = conn
            .query(&sql, libsql::params_from_iter(params))
            .await
            .map_err(|e| Error::Store(format!("failed to select custom-rule candidates: {e}")))?;
        collect_messages(rows).await
    }
}

const ACTIVE_MESSAGES_SELECT: &str = r#"
SELECT id, tenant_id, conversation_id, role, content, metadata,
       importance_score, embedding, embedding_status, created_at, updated_at, archived
FROM messages
WHERE tenant_id = ? AND archived = 0
"#;

async fn collect_messages(mut rows: libsql::Rows) -> Result<Vec<Message>> {
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
