use crate::config::SchedulerConfig;
use crate::pipeline::SchedulingPipeline;
use crate::{Result, SchedulerError};
use lodestar_client::{selectors, ClusterApi};
use lodestar_core::{Pod, PodExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Work for the scheduling actor
#[derive(Debug)]
pub enum WorkItem {
    /// Schedule one pod, optionally after the settle delay
    Schedule { pod: Box<Pod>, settle: bool },
    /// Schedule every claimed pod still waiting for a node
    Sweep,
}

/// Result of one reconcile sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scheduled: usize,
    pub failed: usize,
}

/// Cloneable sender side of the actor's queue
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<WorkItem>,
    sweep_pending: Arc<AtomicBool>,
}

impl SchedulerHandle {
    /// Queue `item`, waiting for room if the queue is full.
    ///
    /// Returns false if the token fired first or the actor has stopped.
    pub async fn submit(&self, item: WorkItem, token: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = token.cancelled() => false,
            sent = self.tx.send(item) => sent.is_ok(),
        }
    }

    /// Queue a sweep unless one is already waiting in the queue
    pub async fn request_sweep(&self, token: &CancellationToken) -> bool {
        if self.sweep_pending.swap(true, Ordering::SeqCst) {
            debug!("Sweep already queued, skipping");
            return true;
        }

        let queued = self.submit(WorkItem::Sweep, token).await;
        if !queued {
            self.sweep_pending.store(false, Ordering::SeqCst);
        }
        queued
    }
}

/// Runs pipelines one at a time, in queue order
pub struct SchedulingActor {
    api: Arc<dyn ClusterApi>,
    pipeline: SchedulingPipeline,
    rx: mpsc::Receiver<WorkItem>,
    sweep_pending: Arc<AtomicBool>,
    scheduler_name: String,
    settle_delay: Duration,
}

impl SchedulingActor {
    pub fn new(api: Arc<dyn ClusterApi>, config: &SchedulerConfig) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let sweep_pending = Arc::new(AtomicBool::new(false));

        let actor = Self {
            pipeline: SchedulingPipeline::new(api.clone(), config),
            api,
            rx,
            sweep_pending: sweep_pending.clone(),
            scheduler_name: config.scheduler_name.clone(),
            settle_delay: config.settle_delay,
        };
        let handle = SchedulerHandle { tx, sweep_pending };

        (actor, handle)
    }

    /// Process work until the token fires or every handle is dropped.
    ///
    /// An in-flight pipeline always runs to completion.
    pub async fn run(mut self, token: CancellationToken) {
        info!(
            "Starting scheduling actor (scheduler name: {})",
            self.scheduler_name
        );

        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                item = self.rx.recv() => match item {
                    Some(item) => item,
                    None => {
                        debug!("All scheduler handles dropped");
                        break;
                    }
                },
            };

            self.handle(item, &token).await;
        }

        info!("Scheduling actor stopped");
    }

    async fn handle(&self, item: WorkItem, token: &CancellationToken) {
        match item {
            WorkItem::Schedule { pod, settle } => {
                if settle && !self.settle(token).await {
                    debug!("Shutdown during settle delay, dropping pod {}", pod.pod_key());
                    return;
                }
                self.schedule(&pod).await;
            }
            WorkItem::Sweep => {
                self.sweep_pending.store(false, Ordering::SeqCst);
                match self.sweep(token).await {
                    Ok(report) => info!(
                        scheduled = report.scheduled,
                        failed = report.failed,
                        "Reconcile sweep finished"
                    ),
                    Err(e) => error!("Reconcile sweep failed: {}", e),
                }
            }
        }
    }

    /// Returns false if cancelled before the delay elapsed
    async fn settle(&self, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(self.settle_delay) => true,
        }
    }

    /// Run the pipeline for one pod, logging the outcome
    async fn schedule(&self, pod: &Pod) -> bool {
        let pod_key = pod.pod_key();
        match self.pipeline.schedule_pod(pod).await {
            Ok(node) => {
                info!("Scheduled pod {} to node {}", pod_key, node);
                true
            }
            Err(e) => {
                log_failure(&pod_key, &e);
                false
            }
        }
    }

    /// Schedule every claimed, unscheduled pod in listing order
    async fn sweep(&self, token: &CancellationToken) -> Result<SweepReport> {
        let pods = self.api.list_pods(selectors::UNSCHEDULED).await?;
        let pending: Vec<Pod> = pods
            .into_iter()
            .filter(|p| p.is_claimed_by(&self.scheduler_name) && p.is_unscheduled())
            .collect();

        debug!("Sweep found {} unscheduled pods", pending.len());

        let mut report = SweepReport::default();
        for pod in &pending {
            if token.is_cancelled() {
                debug!("Shutdown requested, stopping sweep early");
                break;
            }
            if self.schedule(pod).await {
                report.scheduled += 1;
            } else {
                report.failed += 1;
            }
        }

        Ok(report)
    }
}

fn log_failure(pod_key: &str, err: &SchedulerError) {
    match err {
        SchedulerError::NoFit { .. } => info!("Pod {} not scheduled: {}", pod_key, err),
        SchedulerError::BindConflict { .. } => warn!("Failed to bind pod {}: {}", pod_key, err),
        _ => error!("Failed to schedule pod {}: {}", pod_key, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_client::{claimed_by, test_node, test_pod, MockCall, MockCluster};

    fn claimed(name: &str, cpu: &str) -> Pod {
        claimed_by(test_pod(name, "default", cpu), "lodestar")
    }

    fn spawn_actor(
        cluster: &Arc<MockCluster>,
        config: &SchedulerConfig,
    ) -> (SchedulerHandle, CancellationToken, tokio::task::JoinHandle<()>) {
        let (actor, handle) = SchedulingActor::new(cluster.clone(), config);
        let token = CancellationToken::new();
        let task = tokio::spawn(actor.run(token.clone()));
        (handle, token, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_waits_for_settle_delay() {
        let pod = claimed("web", "1");
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2")])
                .with_pods(vec![pod.clone()]),
        );
        let (handle, token, task) = spawn_actor(&cluster, &SchedulerConfig::default());

        let item = WorkItem::Schedule {
            pod: Box::new(pod),
            settle: true,
        };
        assert!(handle.submit(item, &token).await);

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(cluster.calls().await.is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(cluster.bindings().await.len(), 1);

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_schedules_only_claimed_pods() {
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "4")])
                .with_pods(vec![
                    claimed("mine", "1"),
                    test_pod("unclaimed", "default", "1"),
                    claimed_by(test_pod("other", "default", "1"), "default-scheduler"),
                ]),
        );
        let (actor, _handle) = SchedulingActor::new(cluster.clone(), &SchedulerConfig::default());

        let report = actor.sweep(&CancellationToken::new()).await.unwrap();

        assert_eq!(report, SweepReport { scheduled: 1, failed: 0 });
        assert_eq!(
            cluster.bindings().await,
            vec![("default/mine".to_string(), "node1".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_continues_past_failures() {
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2")])
                .with_pods(vec![
                    claimed("too-big", "8"),
                    claimed("conflicted", "500m"),
                    claimed("fits", "500m"),
                ]),
        );
        cluster.reject_binding("default/conflicted").await;
        let (actor, _handle) = SchedulingActor::new(cluster.clone(), &SchedulerConfig::default());

        let report = actor.sweep(&CancellationToken::new()).await.unwrap();

        assert_eq!(report, SweepReport { scheduled: 1, failed: 2 });
        assert_eq!(cluster.events().await.len(), 1);
        assert_eq!(
            cluster.bindings().await,
            vec![("default/fits".to_string(), "node1".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflowing_request_fails_only_that_pod() {
        let mut oversized = claimed("oversized", "9223372036854775807m");
        let spec = oversized.spec.as_mut().unwrap();
        spec.containers.push(spec.containers[0].clone());
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "4")])
                .with_pods(vec![oversized, claimed("good", "1")]),
        );
        let (handle, token, task) = spawn_actor(&cluster, &SchedulerConfig::default());

        assert!(handle.request_sweep(&token).await);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            cluster.bindings().await,
            vec![("default/good".to_string(), "node1".to_string())]
        );
        assert!(!task.is_finished());

        let item = WorkItem::Schedule {
            pod: Box::new(claimed("later", "1")),
            settle: false,
        };
        assert!(handle.submit(item, &token).await);

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_sweep_schedules_nothing() {
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2")])
                .with_pods(vec![claimed("a", "1")]),
        );
        let (actor, _handle) = SchedulingActor::new(cluster.clone(), &SchedulerConfig::default());
        let token = CancellationToken::new();
        token.cancel();

        let report = actor.sweep(&token).await.unwrap();

        assert_eq!(report, SweepReport::default());
        assert_eq!(
            cluster.calls().await,
            vec![MockCall::ListPods(selectors::UNSCHEDULED.to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipelines_never_overlap() {
        let watched = claimed("watched", "500m");
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "4")])
                .with_pods(vec![watched.clone(), claimed("swept", "500m")])
                .with_latency(Duration::from_millis(100)),
        );
        let (handle, token, task) = spawn_actor(&cluster, &SchedulerConfig::default());

        let watch_handle = handle.clone();
        let watch_token = token.clone();
        let producer = tokio::spawn(async move {
            let item = WorkItem::Schedule {
                pod: Box::new(watched),
                settle: false,
            };
            watch_handle.submit(item, &watch_token).await
        });
        assert!(handle.request_sweep(&token).await);
        assert!(producer.await.unwrap());

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(cluster.bindings().await.len(), 2);
        assert_eq!(cluster.max_concurrent_calls(), 1);

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_sweep_coalesces() {
        let cluster = Arc::new(MockCluster::new());
        let (actor, handle) = SchedulingActor::new(cluster.clone(), &SchedulerConfig::default());
        let token = CancellationToken::new();

        assert!(handle.request_sweep(&token).await);
        assert!(handle.request_sweep(&token).await);
        drop(handle);

        // Only one sweep was queued, so only one listing happens
        actor.run(token).await;
        assert_eq!(
            cluster.calls().await,
            vec![MockCall::ListPods(selectors::UNSCHEDULED.to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_settle_drops_pod() {
        let pod = claimed("web", "1");
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2")])
                .with_pods(vec![pod.clone()]),
        );
        let (handle, token, task) = spawn_actor(&cluster, &SchedulerConfig::default());

        let item = WorkItem::Schedule {
            pod: Box::new(pod),
            settle: true,
        };
        assert!(handle.submit(item, &token).await);
        tokio::time::sleep(Duration::from_millis(500)).await;

        token.cancel();
        task.await.unwrap();

        assert!(cluster.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_submit_after_cancel_is_refused() {
        let cluster = Arc::new(MockCluster::new());
        let (_actor, handle) = SchedulingActor::new(cluster, &SchedulerConfig::default());
        let token = CancellationToken::new();
        token.cancel();

        assert!(!handle.submit(WorkItem::Sweep, &token).await);
    }
}
