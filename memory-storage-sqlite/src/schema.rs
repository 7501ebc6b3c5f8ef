//! Table and index definitions for the libSQL backend.

pub const CREATE_MESSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    conversation_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    importance_score REAL,
    embedding BLOB,
    embedding_status TEXT NOT NULL DEFAULT 'pending',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    archived INTEGER NOT NULL DEFAULT 0
)
"#;

pub const CREATE_ARCHIVED_MESSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS archived_messages (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    conversation_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    importance_score REAL,
    created_at INTEGER NOT NULL,
    archived_at INTEGER NOT NULL,
    archive_reason TEXT NOT NULL
)
"#;

pub const CREATE_EMBEDDING_JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS embedding_jobs (
    id TEXT PRIMARY KEY NOT NULL,
    message_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    updated_at INTEGER NOT NULL
)
"#;

pub const CREATE_RETENTION_POLICIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS retention_policies (
    tenant_id TEXT PRIMARY KEY NOT NULL,
    max_age_days INTEGER NOT NULL,
    importance_threshold REAL NOT NULL,
    max_items INTEGER NOT NULL,
    delete_after_days INTEGER NOT NULL
)
"#;

pub const CREATE_RETENTION_RULES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS retention_rules (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    rule_type TEXT NOT NULL,
    conditions TEXT NOT NULL,
    action TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    enabled INTEGER NOT NULL DEFAULT 1,
    last_applied INTEGER
)
"#;

pub const CREATE_MESSAGES_TENANT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_messages_tenant ON messages(tenant_id)
"#;

pub const CREATE_MESSAGES_CONVERSATION_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id)
"#;

pub const CREATE_MESSAGES_CREATED_AT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at)
"#;

pub const CREATE_MESSAGES_TENANT_ARCHIVED_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_messages_tenant_archived ON messages(tenant_id, archived)
"#;

pub const CREATE_ARCHIVED_TENANT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_archived_tenant ON archived_messages(tenant_id, archived_at)
"#;

pub const CREATE_JOBS_MESSAGE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_jobs_message ON embedding_jobs(message_id)
"#;

pub const CREATE_JOBS_STATUS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_jobs_status ON embedding_jobs(status, updated_at)
"#;

pub const CREATE_RULES_TENANT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_rules_tenant ON retention_rules(tenant_id, priority)
"#;

/// Every DDL statement, in dependency order. Run once at startup; every
/// statement is `IF NOT EXISTS` so re-running against an already
/// provisioned database is a no-op.
pub const ALL_STATEMENTS: &[&str] = &[
    CREATE_MESSAGES_TABLE,
    CREATE_ARCHIVED_MESSAGES_TABLE,
    CREATE_EMBEDDING_JOBS_TABLE,
    CREATE_RETENTION_POLICIES_TABLE,
    CREATE_RETENTION_RULES_TABLE,
    CREATE_MESSAGES_TENANT_INDEX,
    CREATE_MESSAGES_CONVERSATION_INDEX,
    CREATE_MESSAGES_CREATED_AT_INDEX,
    CREATE_MESSAGES_TENANT_ARCHIVED_INDEX,
    CREATE_ARCHIVED_TENANT_INDEX,
    CREATE_JOBS_MESSAGE_INDEX,
    CREATE_JOBS_STATUS_INDEX,
    CREATE_RULES_TENANT_INDEX,
];
