use crate::actor::SchedulerHandle;
use crate::config::SchedulerConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Periodically asks the actor to sweep for pods the watch missed
pub struct ReconcileLoop {
    handle: SchedulerHandle,
    interval: Duration,
}

impl ReconcileLoop {
    /// A zero interval is raised to one millisecond
    pub fn new(handle: SchedulerHandle, config: &SchedulerConfig) -> Self {
        Self {
            handle,
            interval: config.reconcile_interval.max(MIN_INTERVAL),
        }
    }

    pub async fn run(self, token: CancellationToken) {
        info!("Starting reconcile loop (interval: {:?})", self.interval);

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Consume the immediate first tick
        interval.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    debug!("Reconcile tick");
                    if !self.handle.request_sweep(&token).await {
                        break;
                    }
                }
            }
        }

        info!("Reconcile loop stopped");
    }
}
