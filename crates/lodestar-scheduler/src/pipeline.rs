use crate::accountant::compute_usage;
use crate::bind::Binder;
use crate::config::SchedulerConfig;
use crate::filter::FitFilter;
use crate::recorder::EventRecorder;
use crate::score::{select_node, ScoreFunction};
use crate::types::SchedulingContext;
use crate::{Result, SchedulerError};
use lodestar_client::{selectors, ClusterApi};
use lodestar_core::{NodeExt, Pod, PodExt, ResourceError};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Filter, score and bind for a single pod
pub struct SchedulingPipeline {
    api: Arc<dyn ClusterApi>,
    filter: FitFilter,
    scorer: Box<dyn ScoreFunction>,
    binder: Binder,
    recorder: EventRecorder,
}

impl SchedulingPipeline {
    pub fn new(api: Arc<dyn ClusterApi>, config: &SchedulerConfig) -> Self {
        Self {
            filter: FitFilter::default(),
            scorer: config.score_policy.scorer(),
            binder: Binder::new(api.clone()),
            recorder: EventRecorder::new(api.clone(), config.scheduler_name.clone()),
            api,
        }
    }

    /// Schedule `pod` and return the chosen node.
    ///
    /// Every stage error aborts the attempt; nothing is retried here.
    pub async fn schedule_pod(&self, pod: &Pod) -> Result<String> {
        if pod.metadata.name.is_none() {
            return Err(ResourceError::missing_field("metadata.name").into());
        }
        let pod_key = pod.pod_key();

        let nodes = self.api.list_nodes().await?;
        let active = self.active_pods().await?;
        let usage = compute_usage(&nodes, &active)?;

        let context = SchedulingContext::new(pod.clone(), nodes, usage)?;
        let outcome = self.filter.fit(&context)?;

        if outcome.is_empty() {
            let reasons = outcome.failure_reasons();
            if let Err(e) = self.recorder.record_fit_failure(pod, &reasons).await {
                error!("Failed to record scheduling event for pod {}: {}", pod_key, e);
            }
            return Err(SchedulerError::no_fit(pod_key, reasons));
        }

        info!(
            "Pod {} has {} feasible nodes",
            pod_key,
            outcome.candidates.len()
        );

        let node = select_node(self.scorer.as_ref(), &context, &outcome.candidates)?;
        let node_name = node.name_or_unknown().to_string();

        self.binder.bind(pod, &node_name).await?;
        Ok(node_name)
    }

    /// Running and Pending pods, de-duplicated across the two listings
    async fn active_pods(&self) -> Result<Vec<Pod>> {
        let running = self.api.list_pods(selectors::PHASE_RUNNING).await?;
        let pending = self.api.list_pods(selectors::PHASE_PENDING).await?;

        let mut seen = HashSet::new();
        let active: Vec<Pod> = running
            .into_iter()
            .chain(pending)
            .filter(|p| {
                let identity = p.metadata.uid.clone().unwrap_or_else(|| p.pod_key());
                seen.insert(identity)
            })
            .collect();

        debug!("Found {} active pods", active.len());
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_client::{claimed_by, running_on, test_node, test_pod, MockCall, MockCluster};

    fn pipeline(cluster: &Arc<MockCluster>) -> SchedulingPipeline {
        SchedulingPipeline::new(cluster.clone(), &SchedulerConfig::default())
    }

    #[tokio::test]
    async fn test_schedule_pod_success() {
        let pod = claimed_by(test_pod("web", "default", "1"), "lodestar");
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2"), test_node("node2", "500m")])
                .with_pods(vec![
                    running_on(test_pod("busy", "default", "500m"), "node1"),
                    pod.clone(),
                ]),
        );

        let node = pipeline(&cluster).schedule_pod(&pod).await.unwrap();

        assert_eq!(node, "node1");
        assert_eq!(
            cluster.bindings().await,
            vec![("default/web".to_string(), "node1".to_string())]
        );
        assert!(cluster.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_fit_posts_exactly_one_event() {
        let pod = test_pod("huge", "team-a", "8");
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2"), test_node("node2", "4")])
                .with_pods(vec![pod.clone()]),
        );

        let err = pipeline(&cluster).schedule_pod(&pod).await.unwrap_err();

        match err {
            SchedulerError::NoFit { reasons, .. } => assert_eq!(reasons.len(), 2),
            other => panic!("expected NoFit, got {:?}", other),
        }
        let events = cluster.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata.namespace.as_deref(), Some("team-a"));
        assert!(cluster.bindings().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_nodes_still_posts_one_event() {
        let pod = test_pod("web", "default", "1");
        let cluster = Arc::new(MockCluster::new().with_pods(vec![pod.clone()]));

        let err = pipeline(&cluster).schedule_pod(&pod).await.unwrap_err();

        assert!(matches!(err, SchedulerError::NoFit { .. }));
        let events = cluster.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].message.as_deref(),
            Some("pod (web) failed to fit in any node\nno node advertises cpu")
        );
    }

    #[tokio::test]
    async fn test_event_failure_still_reports_no_fit() {
        let pod = test_pod("huge", "default", "8");
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2")])
                .with_pods(vec![pod.clone()]),
        );
        cluster.set_fail_events(true).await;

        let err = pipeline(&cluster).schedule_pod(&pod).await.unwrap_err();

        assert!(matches!(err, SchedulerError::NoFit { .. }));
    }

    #[tokio::test]
    async fn test_parse_error_posts_no_event() {
        let pod = test_pod("web", "default", "one");
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2")])
                .with_pods(vec![pod.clone()]),
        );

        let err = pipeline(&cluster).schedule_pod(&pod).await.unwrap_err();

        assert!(matches!(err, SchedulerError::Resource(_)));
        assert!(cluster.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_failure_aborts() {
        let pod = test_pod("web", "default", "1");
        let cluster = Arc::new(MockCluster::new().with_nodes(vec![test_node("node1", "2")]));
        cluster.set_fail_lists(true).await;

        let err = pipeline(&cluster).schedule_pod(&pod).await.unwrap_err();

        assert!(matches!(err, SchedulerError::Client(_)));
        assert_eq!(cluster.calls().await, vec![MockCall::ListNodes]);
    }

    #[tokio::test]
    async fn test_pending_assigned_pods_count_toward_usage() {
        // Bound but not yet running: still consumes CPU on node1
        let mut starting = running_on(test_pod("starting", "default", "2"), "node1");
        starting.status.as_mut().unwrap().phase = Some("Pending".to_string());
        let pod = test_pod("web", "default", "1");
        let cluster = Arc::new(
            MockCluster::new()
                .with_nodes(vec![test_node("node1", "2"), test_node("node2", "1")])
                .with_pods(vec![starting, pod.clone()]),
        );

        let node = pipeline(&cluster).schedule_pod(&pod).await.unwrap();

        assert_eq!(node, "node2");
    }

    #[tokio::test]
    async fn test_pod_without_name_is_rejected() {
        let mut pod = test_pod("web", "default", "1");
        pod.metadata.name = None;
        let cluster = Arc::new(MockCluster::new());

        let err = pipeline(&cluster).schedule_pod(&pod).await.unwrap_err();

        assert!(matches!(
            err,
            SchedulerError::Resource(ResourceError::MissingField { .. })
        ));
        assert!(cluster.calls().await.is_empty());
    }
}
