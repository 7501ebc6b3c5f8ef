//! Periodic fan-out of [`super::LifecycleEngine::apply`] across tenants.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::store::Repository;

use super::LifecycleEngine;

/// `{interval_seconds, tenants}` from §6.3. Disabled when `interval_seconds
/// <= 0` or `tenants` is empty.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval_seconds: i64,
    pub tenants: Vec<String>,
}

impl SchedulerConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.interval_seconds > 0 && !self.tenants.is_empty()
    }
}

/// Runs [`LifecycleEngine::apply`] for every configured tenant on a fixed
/// interval. `'*'` resolves to [`Repository::list_tenants`] at each tick so
/// newly observed tenants are picked up automatically.
pub struct RetentionScheduler {
    engine: Arc<LifecycleEngine>,
    repository: Arc<dyn Repository>,
    config: SchedulerConfig,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl RetentionScheduler {
    #[must_use]
    pub fn new(engine: Arc<LifecycleEngine>, repository: Arc<dyn Repository>, config: SchedulerConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            engine,
            repository,
            config,
            stop_tx,
            stop_rx,
        }
    }

    /// Spawn the scheduler task. A no-op, already-completed handle is
    /// returned when the scheduler is disabled.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run().await })
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    async fn run(&self) {
        if !self.config.is_enabled() {
            info!("retention scheduler disabled");
            return;
        }

        info!(interval_seconds = self.config.interval_seconds, "retention scheduler starting");
        let mut stop_rx = self.stop_rx.clone();
        let interval = Duration::from_secs(self.config.interval_seconds.max(1) as u64);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
            if *stop_rx.borrow() {
                break;
            }

            let tenants = match self.resolve_tenants().await {
                Ok(tenants) => tenants,
                Err(err) => {
                    warn!(error = %err, "failed to resolve tenants for retention sweep");
                    continue;
                }
            };

            for tenant in tenants {
                match self.engine.apply(&tenant, false).await {
                    Ok(report) => info!(tenant = %tenant, ?report, "retention sweep complete"),
                    Err(err) => warn!(tenant = %tenant, error = %err, "retention sweep failed"),
                }
            }
        }
        info!("retention scheduler stopped");
    }

    async fn resolve_tenants(&self) -> crate::error::Result<Vec<String>> {
        if self.config.tenants.iter().any(|t| t == "*") {
            let mut tx = self.repository.begin().await?;
            let tenants = self.repository.list_tenants(&mut tx).await?;
            self.repository.commit(tx).await?;
            Ok(tenants)
        } else {
            Ok(self.config.tenants.clone())
        }
    }
}
