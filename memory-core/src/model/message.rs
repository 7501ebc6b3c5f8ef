//! The `Message` entity and its satellite enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::Metadata;

/// Author of a message within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(crate::Error::Validation(format!("invalid role: {other}"))),
        }
    }
}

/// Lifecycle status of a message's embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EmbeddingStatus::Pending => "pending",
            EmbeddingStatus::Completed => "completed",
            EmbeddingStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for EmbeddingStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EmbeddingStatus::Pending),
            "completed" => Ok(EmbeddingStatus::Completed),
            "failed" => Ok(EmbeddingStatus::Failed),
            other => Err(crate::Error::Internal(format!(
                "invalid embedding_status in store: {other}"
            ))),
        }
    }
}

/// A single chat message belonging to a tenant/conversation.
///
/// `id` and `created_at` are assigned by the store and never change after
/// insertion. `archived` only ever flips `false -> true`; once it does, a
/// twin row exists in [`crate::model::ArchivedMessage`] with the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub tenant_id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub metadata: Metadata,
    pub importance_score: Option<f32>,
    pub embedding: Option<Vec<f32>>,
    pub embedding_status: EmbeddingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub archived: bool,
}

impl Message {
    /// Age of the message relative to `now`, in seconds. Never negative.
    #[must_use]
    pub fn age_seconds(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds().max(0) as f64 / 1000.0
    }
}

/// A snapshot of a [`Message`] taken at archival time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedMessage {
    pub id: Uuid,
    pub tenant_id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub metadata: Metadata,
    pub importance_score: Option<f32>,
    pub created_at: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
    pub archive_reason: String,
}

impl ArchivedMessage {
    /// Build an archive twin from a live message and a reason tag.
    #[must_use]
    pub fn from_message(message: &Message, archived_at: DateTime<Utc>, reason: String) -> Self {
        Self {
            id: message.id,
            tenant_id: message.tenant_id.clone(),
            conversation_id: message.conversation_id.clone(),
            role: message.role,
            content: message.content.clone(),
            metadata: message.metadata.clone(),
            importance_score: message.importance_score,
            created_at: message.created_at,
            archived_at,
            archive_reason: reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::User, Role::Assistant, Role::System] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn age_seconds_never_negative() {
        let now = Utc::now();
        let msg = Message {
            id: Uuid::new_v4(),
            tenant_id: "t1".into(),
            conversation_id: "c1".into(),
            role: Role::User,
            content: "hi".into(),
            metadata: Metadata::empty(),
            importance_score: None,
            embedding: None,
            embedding_status: EmbeddingStatus::Pending,
            created_at: now + chrono::Duration::seconds(5),
            updated_at: now,
            archived: false,
        };
        assert_eq!(msg.age_seconds(now), 0.0);
    }
}
