//! Row <-> entity conversions and the small encodings (embedding blob,
//! metadata JSON, epoch timestamps) the schema uses.

use chrono::{DateTime, TimeZone, Utc};
use memory_core::{
    ArchivedMessage, EmbeddingJob, EmbeddingStatus, Error, JobStatus, Message, Metadata, Result,
    RetentionPolicy, RetentionRule, Role, RuleAction, RuleType,
};
use uuid::Uuid;

fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}

pub fn to_epoch_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_epoch_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::Store(format!("invalid stored timestamp: {millis}")))
}

pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::Store(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Store(format!("invalid stored uuid {s}: {e}")))
}

pub fn row_to_message(row: &libsql::Row) -> Result<Message> {
    let id: String = row.get(0).map_err(storage_err)?;
    let tenant_id: String = row.get(1).map_err(storage_err)?;
    let conversation_id: String = row.get(2).map_err(storage_err)?;
    let role: String = row.get(3).map_err(storage_err)?;
    let content: String = row.get(4).map_err(storage_err)?;
    let metadata_json: String = row.get(5).map_err(storage_err)?;
    let importance_score: Option<f64> = row.get(6).map_err(storage_err)?;
    let embedding_blob: Option<Vec<u8>> = row.get(7).map_err(storage_err)?;
    let embedding_status: String = row.get(8).map_err(storage_err)?;
    let created_at: i64 = row.get(9).map_err(storage_err)?;
    let updated_at: i64 = row.get(10).map_err(storage_err)?;
    let archived: i64 = row.get(11).map_err(storage_err)?;

    let metadata_value: serde_json::Value = serde_json::from_str(&metadata_json)?;

    Ok(Message {
        id: parse_uuid(&id)?,
        tenant_id,
        conversation_id,
        role: role.parse::<Role>()?,
        content,
        metadata: Metadata::from(metadata_value),
        importance_score: importance_score.map(|v| v as f32),
        embedding: embedding_blob.map(|b| blob_to_embedding(&b)).transpose()?,
        embedding_status: embedding_status.parse::<EmbeddingStatus>()?,
        created_at: from_epoch_millis(created_at)?,
        updated_at: from_epoch_millis(updated_at)?,
        archived: archived != 0,
    })
}

pub fn row_to_archived_message(row: &libsql::Row) -> Result<ArchivedMessage> {
    let id: String = row.get(0).map_err(storage_err)?;
    let tenant_id: String = row.get(1).map_err(storage_err)?;
    let conversation_id: String = row.get(2).map_err(storage_err)?;
    let role: String = row.get(3).map_err(storage_err)?;
    let content: String = row.get(4).map_err(storage_err)?;
    let metadata_json: String = row.get(5).map_err(storage_err)?;
    let importance_score: Option<f64> = row.get(6).map_err(storage_err)?;
    let created_at: i64 = row.get(7).map_err(storage_err)?;
    let archived_at: i64 = row.get(8).map_err(storage_err)?;
    let archive_reason: String = row.get(9).map_err(storage_err)?;

    let metadata_value: serde_json::Value = serde_json::from_str(&metadata_json)?;

    Ok(ArchivedMessage {
        id: parse_uuid(&id)?,
        tenant_id,
        conversation_id,
        role: role.parse::<Role>()?,
        content,
        metadata: Metadata::from(metadata_value),
        importance_score: importance_score.map(|v| v as f32),
        created_at: from_epoch_millis(created_at)?,
        archived_at: from_epoch_millis(archived_at)?,
        archive_reason,
    })
}

pub fn row_to_job(row: &libsql::Row) -> Result<EmbeddingJob> {
    let id: String = row.get(0).map_err(storage_err)?;
    let message_id: String = row.get(1).map_err(storage_err)?;
    let status: String = row.get(2).map_err(storage_err)?;
    let attempts: i64 = row.get(3).map_err(storage_err)?;
    let last_error: Option<String> = row.get(4).map_err(storage_err)?;
    let updated_at: i64 = row.get(5).map_err(storage_err)?;

    Ok(EmbeddingJob {
        id: parse_uuid(&id)?,
        message_id: parse_uuid(&message_id)?,
        status: status.parse::<JobStatus>()?,
        attempts: attempts as u32,
        last_error,
        updated_at: from_epoch_millis(updated_at)?,
    })
}

pub fn row_to_policy(row: &libsql::Row) -> Result<RetentionPolicy> {
    let tenant_id: String = row.get(0).map_err(storage_err)?;
    let max_age_days: i64 = row.get(1).map_err(storage_err)?;
    let importance_threshold: f64 = row.get(2).map_err(storage_err)?;
    let max_items: i64 = row.get(3).map_err(storage_err)?;
    let delete_after_days: i64 = row.get(4).map_err(storage_err)?;

    Ok(RetentionPolicy {
        tenant_id,
        max_age_days: max_age_days as u32,
        importance_threshold: importance_threshold as f32,
        max_items: max_items as u32,
        delete_after_days: delete_after_days as u32,
    })
}

pub fn row_to_rule(row: &libsql::Row) -> Result<RetentionRule> {
    let id: String = row.get(0).map_err(storage_err)?;
    let tenant_id: String = row.get(1).map_err(storage_err)?;
    let name: String = row.get(2).map_err(storage_err)?;
    let rule_type: String = row.get(3).map_err(storage_err)?;
    let conditions_json: String = row.get(4).map_err(storage_err)?;
    let action: String = row.get(5).map_err(storage_err)?;
    let priority: i64 = row.get(6).map_err(storage_err)?;
    let enabled: i64 = row.get(7).map_err(storage_err)?;
    let last_applied: Option<i64> = row.get(8).map_err(storage_err)?;

    Ok(RetentionRule {
        id: parse_uuid(&id)?,
        tenant_id,
        name,
        rule_type: rule_type.parse::<RuleType>()?,
        conditions: serde_json::from_str(&conditions_json)?,
        action: action.parse::<RuleAction>()?,
        priority: priority as i32,
        enabled: enabled != 0,
        last_applied: last_applied.map(from_epoch_millis).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_blob_round_trips() {
        let vec = vec![0.5_f32, -1.25, 3.0];
        let blob = embedding_to_blob(&vec);
        let back = blob_to_embedding(&blob).unwrap();
        assert_eq!(vec, back);
    }

    #[test]
    fn malformed_blob_length_is_rejected() {
        assert!(blob_to_embedding(&[0u8, 1, 2]).is_err());
    }

    #[test]
    fn epoch_millis_round_trips() {
        let now = Utc::now();
        let millis = to_epoch_millis(now);
        let back = from_epoch_millis(millis).unwrap();
        assert_eq!(now.timestamp_millis(), back.timestamp_millis());
    }
}
