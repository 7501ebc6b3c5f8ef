mod http;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use memory_core::config::Config;
use memory_core::embeddings::build_provider;
use memory_core::lifecycle::scheduler::{RetentionScheduler, SchedulerConfig};
use memory_core::lifecycle::LifecycleEngine;
use memory_core::queue::{EmbeddingJobQueue, QueueConfig};
use memory_core::ratelimit::RateLimiter;
use memory_core::service::MessageService;
use memory_core::store::Repository;
use memory_storage_sqlite::SqliteStorage;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "memory-server", about = "Conversation memory HTTP service")]
struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "MEMORY_SERVER_ADDR", default_value = "0.0.0.0:8080")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let storage = Arc::new(open_storage(&config.database.database_url).await?);
    storage.init_schema().await?;
    let repository: Arc<dyn Repository> = storage;

    let circuit_config = memory_core::embeddings::CircuitBreakerConfig {
        failure_threshold: config.embedding.circuit_failure_threshold,
        recovery_time: config.embedding.circuit_recovery,
        ..memory_core::embeddings::CircuitBreakerConfig::default()
    };
    let provider = Arc::new(build_provider(
        &config.embedding.provider,
        config.embedding.dimensions,
        config.embedding.remote_endpoint.as_deref(),
        circuit_config,
    ));
    let cache = Arc::new(memory_core::cache::ResultCache::new(config.cache.max_items));

    let service = Arc::new(MessageService::new(
        Arc::clone(&repository),
        provider.clone(),
        Arc::clone(&cache),
        config.embedding.clone(),
        config.cache.clone(),
        config.max_results,
    ));

    let job_queue = Arc::new(EmbeddingJobQueue::new(
        Arc::clone(&repository),
        provider,
        Arc::clone(&cache),
        QueueConfig {
            poll_interval: config.embedding.job_poll,
            batch_size: config.embedding.job_batch_size,
            max_attempts: config.embedding.job_max_attempts,
            retry_backoff: config.embedding.job_retry_backoff,
            stuck_timeout: std::time::Duration::from_secs(60),
        },
    ));
    let queue_handle = job_queue.start();

    let lifecycle = Arc::new(LifecycleEngine::new(Arc::clone(&repository), config.retention.clone()));
    let scheduler = Arc::new(RetentionScheduler::new(
        Arc::clone(&lifecycle),
        Arc::clone(&repository),
        SchedulerConfig {
            interval_seconds: config.retention.schedule_seconds,
            tenants: config.retention.tenants.clone(),
        },
    ));
    let scheduler_handle = scheduler.start();

    let rate_limiter = Arc::new(RateLimiter::new(
        &config.shell.global_rate_limit,
        &config.shell.tenant_rate_limit,
    )?);

    let app_state = Arc::new(AppState {
        repository,
        service,
        lifecycle,
        rate_limiter,
        config: Arc::new(config),
        started_at: Instant::now(),
    });

    let app = http::create_router(Arc::clone(&app_state));
    let listener = tokio::net::TcpListener::bind(cli.addr).await?;
    info!(addr = %cli.addr, "memory-server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    scheduler.stop();
    job_queue.stop();
    let _ = scheduler_handle.await;
    let _ = queue_handle.await;

    Ok(())
}

async fn open_storage(database_url: &str) -> anyhow::Result<SqliteStorage> {
    if database_url == ":memory:" || database_url == "file::memory:" {
        Ok(SqliteStorage::open_memory().await?)
    } else if let Some(path) = database_url.strip_prefix("file:") {
        Ok(SqliteStorage::open_local(path).await?)
    } else {
        Ok(SqliteStorage::open_local(database_url).await?)
    }
}
