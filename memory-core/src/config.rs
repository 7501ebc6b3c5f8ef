//! Service configuration: env-var layering over typed defaults (§6.3).
//!
//! Every key is optional; an absent or unparsable value falls back to the
//! documented default and logs a warning so misconfiguration is visible
//! without aborting startup.

use std::time::Duration;

/// Primary + replica store connection, and pool shape.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub read_replica_urls: Vec<String>,
    pub pool_size: u32,
    pub max_overflow: u32,
    pub pool_recycle_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "file:./data/memory.db".to_string(),
            read_replica_urls: Vec::new(),
            pool_size: 20,
            max_overflow: 10,
            pool_recycle_seconds: 3600,
        }
    }
}

/// Embedding provider selection and the durable job queue's pacing.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub dimensions: usize,
    pub remote_endpoint: Option<String>,
    pub async_embeddings: bool,
    pub job_poll: Duration,
    pub job_batch_size: u32,
    pub job_max_attempts: u32,
    pub job_retry_backoff: Duration,
    pub circuit_failure_threshold: u32,
    pub circuit_recovery: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            dimensions: 1536,
            remote_endpoint: None,
            async_embeddings: false,
            job_poll: Duration::from_secs_f64(1.0),
            job_batch_size: 10,
            job_max_attempts: 3,
            job_retry_backoff: Duration::from_secs_f64(5.0),
            circuit_failure_threshold: 5,
            circuit_recovery: Duration::from_secs(30),
        }
    }
}

/// Result cache sizing and TTLs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_items: usize,
    pub search_ttl: Duration,
    pub embedding_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_items: 2000,
            search_ttl: Duration::from_secs(60),
            embedding_ttl: Duration::from_secs(3600),
        }
    }
}

/// Default retention policy and the scheduler's fan-out cadence.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub max_age_days: u32,
    pub importance_threshold: f32,
    pub delete_after_days: u32,
    pub schedule_seconds: i64,
    pub tenants: Vec<String>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            importance_threshold: 0.35,
            delete_after_days: 90,
            schedule_seconds: 86_400,
            tenants: vec!["*".to_string()],
        }
    }
}

/// Rate limiting and the request shell's timeout/size cap.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub global_rate_limit: String,
    pub tenant_rate_limit: String,
    pub request_timeout: Duration,
    pub request_max_bytes: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            global_rate_limit: "200/minute".to_string(),
            tenant_rate_limit: "120/minute".to_string(),
            request_timeout: Duration::from_secs(15),
            request_max_bytes: 1_048_576,
        }
    }
}

/// The complete, layered service configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
    pub retention: RetentionConfig,
    pub shell: ShellConfig,
    pub max_results: u32,
}

impl Config {
    /// Build configuration from the process environment, falling back to
    /// documented defaults for anything absent or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self {
            max_results: env_u32("MAX_RESULTS", 8),
            ..Self::default()
        };

        config.database.database_url = env_string("DATABASE_URL", &config.database.database_url);
        config.database.read_replica_urls = env_string_list("READ_REPLICA_URLS");
        config.database.pool_size = env_u32("DATABASE_POOL_SIZE", config.database.pool_size);
        config.database.max_overflow = env_u32("MAX_OVERFLOW", config.database.max_overflow);
        config.database.pool_recycle_seconds =
            env_u64("POOL_RECYCLE", config.database.pool_recycle_seconds);

        config.embedding.provider = env_string("EMBEDDING_PROVIDER", &config.embedding.provider);
        config.embedding.dimensions = env_usize("EMBEDDING_DIMENSIONS", config.embedding.dimensions);
        config.embedding.remote_endpoint = std::env::var("EMBEDDING_REMOTE_ENDPOINT").ok();
        config.embedding.async_embeddings =
            env_bool("ASYNC_EMBEDDINGS", config.embedding.async_embeddings);
        config.embedding.job_poll =
            Duration::from_secs_f64(env_f64("EMBEDDING_JOB_POLL_SECONDS", 1.0));
        config.embedding.job_batch_size =
            env_u32("EMBEDDING_JOB_BATCH_SIZE", config.embedding.job_batch_size);
        config.embedding.job_max_attempts =
            env_u32("EMBEDDING_JOB_MAX_ATTEMPTS", config.embedding.job_max_attempts);
        config.embedding.job_retry_backoff =
            Duration::from_secs_f64(env_f64("EMBEDDING_JOB_RETRY_BACKOFF_SECONDS", 5.0));
        config.embedding.circuit_failure_threshold =
            env_u32("CIRCUIT_FAILURE_THRESHOLD", config.embedding.circuit_failure_threshold);
        config.embedding.circuit_recovery =
            Duration::from_secs(env_u64("CIRCUIT_RECOVERY_SECONDS", 30));

        config.cache.enabled = env_bool("CACHE_ENABLED", config.cache.enabled);
        config.cache.max_items = env_usize("CACHE_MAX_ITEMS", config.cache.max_items);
        config.cache.search_ttl = Duration::from_secs(env_u64("CACHE_SEARCH_TTL_SECONDS", 60));
        config.cache.embedding_ttl =
            Duration::from_secs(env_u64("CACHE_EMBEDDING_TTL_SECONDS", 3600));

        config.retention.max_age_days =
            env_u32("RETENTION_MAX_AGE_DAYS", config.retention.max_age_days);
        config.retention.importance_threshold =
            env_f32("RETENTION_IMPORTANCE_THRESHOLD", config.retention.importance_threshold);
        config.retention.delete_after_days =
            env_u32("RETENTION_DELETE_AFTER_DAYS", config.retention.delete_after_days);
        config.retention.schedule_seconds =
            env_i64("RETENTION_SCHEDULE_SECONDS", config.retention.schedule_seconds);
        let tenants = env_string_list("RETENTION_TENANTS");
        if !tenants.is_empty() {
            config.retention.tenants = tenants;
        }

        config.shell.global_rate_limit =
            env_string("GLOBAL_RATE_LIMIT", &config.shell.global_rate_limit);
        config.shell.tenant_rate_limit =
            env_string("TENANT_RATE_LIMIT", &config.shell.tenant_rate_limit);
        config.shell.request_timeout =
            Duration::from_secs(env_u64("REQUEST_TIMEOUT_SECONDS", 15));
        config.shell.request_max_bytes =
            env_usize("REQUEST_MAX_BYTES", config.shell.request_max_bytes);

        config
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_string_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn env_bool(key: &str, default: bool) -> bool {
    parse_env_or_warn(key, default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    parse_env_or_warn(key, default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    parse_env_or_warn(key, default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    parse_env_or_warn(key, default)
}

fn env_usize(key: &str, default: usize) -> usize {
    parse_env_or_warn(key, default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    parse_env_or_warn(key, default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    parse_env_or_warn(key, default)
}

fn parse_env_or_warn<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "invalid config value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_env_falls_back_to_default() {
        std::env::remove_var("MAX_RESULTS");
        let config = Config::from_env();
        assert_eq!(config.max_results, 8);
    }

    #[test]
    #[serial]
    fn invalid_env_value_falls_back_to_default() {
        std::env::set_var("MAX_RESULTS", "not-a-number");
        let config = Config::from_env();
        assert_eq!(config.max_results, 8);
        std::env::remove_var("MAX_RESULTS");
    }

    #[test]
    #[serial]
    fn valid_env_value_overrides_default() {
        std::env::set_var("MAX_RESULTS", "42");
        let config = Config::from_env();
        assert_eq!(config.max_results, 42);
        std::env::remove_var("MAX_RESULTS");
    }
}
