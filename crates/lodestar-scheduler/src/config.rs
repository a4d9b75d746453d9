use crate::score::ScorePolicy;
use std::time::Duration;

/// Name pods put in the claim annotation to select this scheduler
pub const DEFAULT_SCHEDULER_NAME: &str = "lodestar";

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Value of the claim annotation this scheduler owns
    pub scheduler_name: String,
    /// Interval between reconcile sweeps
    pub reconcile_interval: Duration,
    /// Wait before scheduling a pod seen on the watch
    pub settle_delay: Duration,
    /// Wait before reopening a failed or closed watch
    pub reconnect_backoff: Duration,
    /// Capacity of the work queue in front of the scheduling actor
    pub queue_capacity: usize,
    /// How long shutdown waits for tasks before aborting them
    pub shutdown_timeout: Duration,
    /// Node scoring policy
    pub score_policy: ScorePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_name: DEFAULT_SCHEDULER_NAME.to_string(),
            reconcile_interval: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            reconnect_backoff: Duration::from_secs(5),
            queue_capacity: 256,
            shutdown_timeout: Duration::from_secs(10),
            score_policy: ScorePolicy::default(),
        }
    }
}
