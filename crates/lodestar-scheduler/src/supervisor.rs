use crate::actor::SchedulingActor;
use crate::config::SchedulerConfig;
use crate::reconcile::ReconcileLoop;
use crate::watch::WatchDispatcher;
use crate::{Result, SchedulerError};
use futures_util::future::{join_all, select_all};
use lodestar_client::ClusterApi;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Owns the scheduler's tasks for the life of the process
pub struct Supervisor {
    api: Arc<dyn ClusterApi>,
    config: SchedulerConfig,
}

impl Supervisor {
    pub fn new(api: Arc<dyn ClusterApi>, config: SchedulerConfig) -> Self {
        Self { api, config }
    }

    /// Run the actor, watch dispatcher and reconcile loop until the token
    /// fires, then wait up to `shutdown_timeout` for them before aborting.
    ///
    /// If any of them stops on its own first, the rest are shut down the
    /// same way and an error is returned.
    pub async fn run(self, token: CancellationToken) -> Result<()> {
        let (actor, handle) = SchedulingActor::new(self.api.clone(), &self.config);
        let dispatcher = WatchDispatcher::new(self.api.clone(), handle.clone(), &self.config);
        let reconcile = ReconcileLoop::new(handle, &self.config);

        let mut tasks = vec![
            ("scheduling actor", tokio::spawn(actor.run(token.clone()))),
            ("watch dispatcher", tokio::spawn(dispatcher.run(token.clone()))),
            ("reconcile loop", tokio::spawn(reconcile.run(token.clone()))),
        ];
        let abort_handles: Vec<_> = tasks.iter().map(|(_, t)| t.abort_handle()).collect();

        info!(
            "Scheduler {} running (policy: {})",
            self.config.scheduler_name, self.config.score_policy
        );

        let exited = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            (result, index, _) = select_all(tasks.iter_mut().map(|(_, t)| t)) => {
                Some((index, result))
            }
        };

        let failure = exited.map(|(index, result)| {
            let (name, _) = tasks.remove(index);
            match result {
                Ok(()) => error!("{} stopped unexpectedly", name),
                Err(e) => error!("{} task failed: {}", name, e),
            }
            token.cancel();
            SchedulerError::internal_error(format!("{} exited before shutdown", name))
        });

        info!("Shutting down scheduler");

        let joined = tokio::time::timeout(
            self.config.shutdown_timeout,
            join_all(tasks.into_iter().map(|(name, task)| finish(name, task))),
        )
        .await;

        if joined.is_err() {
            warn!(
                "Scheduler tasks did not stop within {:?}, aborting",
                self.config.shutdown_timeout
            );
            for handle in abort_handles {
                handle.abort();
            }
        }

        info!("Scheduler stopped");
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn finish(name: &str, task: JoinHandle<()>) {
    if let Err(e) = task.await {
        error!("{} task failed: {}", name, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lodestar_client::{claimed_by, test_node, test_pod, MockCluster, WatchStream};
    use lodestar_core::{Binding, Event, Node, Pod};
    use std::time::Duration;

    /// Delegates to a mock cluster but panics when pods are listed
    struct PanickingCluster {
        inner: MockCluster,
    }

    #[async_trait]
    impl ClusterApi for PanickingCluster {
        async fn list_nodes(&self) -> lodestar_client::Result<Vec<Node>> {
            self.inner.list_nodes().await
        }

        async fn list_pods(&self, _field_selector: &str) -> lodestar_client::Result<Vec<Pod>> {
            panic!("pod listing blew up");
        }

        async fn watch_pods(
            &self,
            field_selector: &str,
        ) -> lodestar_client::Result<WatchStream<Pod>> {
            self.inner.watch_pods(field_selector).await
        }

        async fn create_binding(
            &self,
            namespace: &str,
            pod_name: &str,
            binding: &Binding,
        ) -> lodestar_client::Result<()> {
            self.inner.create_binding(namespace, pod_name, binding).await
        }

        async fn create_event(
            &self,
            namespace: &str,
            event: &Event,
        ) -> lodestar_client::Result<()> {
            self.inner.create_event(namespace, event).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_loops() {
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2")])
                .with_pods(vec![claimed_by(test_pod("web", "default", "1"), "lodestar")]),
        );
        let token = CancellationToken::new();
        let supervisor = Supervisor::new(cluster.clone(), SchedulerConfig::default());
        let task = tokio::spawn(supervisor.run(token.clone()));

        // One reconcile sweep places the pod
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(cluster.bindings().await.len(), 1);
        assert!(cluster.watch_open().await);

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let calls = cluster.calls().await.len();
        assert!(!cluster.watch_open().await);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(cluster.calls().await.len(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_pipeline_is_aborted_after_timeout() {
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2")])
                .with_pods(vec![claimed_by(test_pod("web", "default", "1"), "lodestar")])
                .with_latency(Duration::from_secs(60)),
        );
        let token = CancellationToken::new();
        let config = SchedulerConfig {
            shutdown_timeout: Duration::from_secs(10),
            ..Default::default()
        };
        let task = tokio::spawn(Supervisor::new(cluster.clone(), config).run(token.clone()));

        // The sweep starts at 30s and is stuck in a slow listing
        tokio::time::sleep(Duration::from_secs(31)).await;
        token.cancel();

        let started = tokio::time::Instant::now();
        task.await.unwrap().unwrap();
        assert!(started.elapsed() <= Duration::from_secs(11));
        assert!(cluster.bindings().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_panic_stops_supervisor_with_error() {
        let cluster = Arc::new(PanickingCluster {
            inner: MockCluster::new().with_nodes(vec![test_node("node1", "2")]),
        });
        let token = CancellationToken::new();
        let supervisor = Supervisor::new(cluster.clone(), SchedulerConfig::default());
        let task = tokio::spawn(supervisor.run(token.clone()));

        // The first reconcile sweep panics inside the actor
        let result = tokio::time::timeout(Duration::from_secs(45), task)
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(result, Err(SchedulerError::Internal { .. })));
        assert!(token.is_cancelled());
        assert!(!cluster.inner.watch_open().await);
    }
}
