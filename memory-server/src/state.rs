//! Shared application state handed to every handler via [`axum::extract::State`].

use std::sync::Arc;
use std::time::Instant;

use memory_core::config::Config;
use memory_core::lifecycle::LifecycleEngine;
use memory_core::ratelimit::RateLimiter;
use memory_core::service::MessageService;
use memory_core::store::Repository;

pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub service: Arc<MessageService>,
    pub lifecycle: Arc<LifecycleEngine>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<Config>,
    pub started_at: Instant,
}
