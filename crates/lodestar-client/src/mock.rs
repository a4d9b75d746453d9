use crate::error::{ClientError, Result};
use crate::traits::{selectors, ClusterApi};
use crate::watch::WatchStream;
use async_trait::async_trait;
use futures_util::stream;
use k8s_openapi::api::core::v1::{
    Binding, Container, Event, Node, NodeStatus, Pod, PodSpec, PodStatus, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use lodestar_core::{PodExt, WatchEvent, SCHEDULER_NAME_ANNOTATION};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// A control-plane call recorded by [`MockCluster`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ListNodes,
    ListPods(String),
    WatchPods(String),
    CreateBinding {
        namespace: String,
        pod: String,
        node: String,
    },
    CreateEvent {
        namespace: String,
        involved: String,
    },
}

type WatchSender = mpsc::UnboundedSender<Result<WatchEvent<Pod>>>;

#[derive(Default)]
struct MockState {
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    calls: Vec<MockCall>,
    bindings: Vec<(String, String)>,
    events: Vec<Event>,
    conflicting_pods: HashSet<String>,
    fail_events: bool,
    fail_lists: bool,
    watch_connect_failures: usize,
    watch: Option<WatchSender>,
}

/// In-memory control plane for tests.
///
/// Binding a pod sets its `spec.nodeName`, so later listings see the new
/// assignment. The watch feed is driven by the test through
/// [`send_watch_event`](Self::send_watch_event).
#[derive(Default)]
pub struct MockCluster {
    state: Mutex<MockState>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Tracks how many request/response calls are running at once
struct InFlight<'a> {
    cluster: &'a MockCluster,
}

impl<'a> InFlight<'a> {
    fn enter(cluster: &'a MockCluster) -> Self {
        let now = cluster.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        cluster.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { cluster }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.cluster.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(mut self, nodes: Vec<Node>) -> Self {
        self.state.get_mut().nodes = nodes;
        self
    }

    pub fn with_pods(mut self, pods: Vec<Pod>) -> Self {
        self.state.get_mut().pods = pods;
        self
    }

    /// Delay every request/response call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn add_node(&self, node: Node) {
        self.state.lock().await.nodes.push(node);
    }

    pub async fn add_pod(&self, pod: Pod) {
        self.state.lock().await.pods.push(pod);
    }

    /// Make bindings for `namespace/name` fail with a conflict
    pub async fn reject_binding(&self, pod_key: impl Into<String>) {
        self.state
            .lock()
            .await
            .conflicting_pods
            .insert(pod_key.into());
    }

    pub async fn set_fail_events(&self, fail: bool) {
        self.state.lock().await.fail_events = fail;
    }

    pub async fn set_fail_lists(&self, fail: bool) {
        self.state.lock().await.fail_lists = fail;
    }

    /// Refuse the next `count` watch connections
    pub async fn fail_watch_connects(&self, count: usize) {
        self.state.lock().await.watch_connect_failures = count;
    }

    /// Push an event to the open watch. Returns false when no watch is open.
    pub async fn send_watch_event(&self, event: WatchEvent<Pod>) -> bool {
        let state = self.state.lock().await;
        match &state.watch {
            Some(tx) => tx.send(Ok(event)).is_ok(),
            None => false,
        }
    }

    /// Deliver a decode error on the open watch and close it
    pub async fn fail_watch_stream(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.watch.take() {
            Some(tx) => tx
                .send(Err(ClientError::decode("watch event", "malformed line")))
                .is_ok(),
            None => false,
        }
    }

    /// End the open watch stream as if the server closed it
    pub async fn close_watch(&self) {
        self.state.lock().await.watch.take();
    }

    /// Whether a watch is open and its reader is still alive
    pub async fn watch_open(&self) -> bool {
        self.state
            .lock()
            .await
            .watch
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.lock().await.calls.clone()
    }

    /// `(namespace/name, node)` for every successful binding, in order
    pub async fn bindings(&self) -> Vec<(String, String)> {
        self.state.lock().await.bindings.clone()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.state.lock().await.events.clone()
    }

    pub async fn pods(&self) -> Vec<Pod> {
        self.state.lock().await.pods.clone()
    }

    /// Highest number of request/response calls observed running at once
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn matches_selector(pod: &Pod, field_selector: &str) -> bool {
    let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
    match field_selector {
        selectors::UNSCHEDULED => pod.is_unscheduled(),
        selectors::PHASE_RUNNING => phase == Some("Running"),
        selectors::PHASE_PENDING => phase == Some("Pending"),
        _ => true,
    }
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let _guard = InFlight::enter(self);
        self.simulate_latency().await;

        let mut state = self.state.lock().await;
        state.calls.push(MockCall::ListNodes);
        if state.fail_lists {
            return Err(ClientError::transport("list nodes", "connection refused"));
        }
        Ok(state.nodes.clone())
    }

    async fn list_pods(&self, field_selector: &str) -> Result<Vec<Pod>> {
        let _guard = InFlight::enter(self);
        self.simulate_latency().await;

        let mut state = self.state.lock().await;
        state
            .calls
            .push(MockCall::ListPods(field_selector.to_string()));
        if state.fail_lists {
            return Err(ClientError::transport("list pods", "connection refused"));
        }
        Ok(state
            .pods
            .iter()
            .filter(|p| matches_selector(p, field_selector))
            .cloned()
            .collect())
    }

    async fn watch_pods(&self, field_selector: &str) -> Result<WatchStream<Pod>> {
        let mut state = self.state.lock().await;
        state
            .calls
            .push(MockCall::WatchPods(field_selector.to_string()));

        if state.watch_connect_failures > 0 {
            state.watch_connect_failures -= 1;
            return Err(ClientError::transport("watch pods", "connection refused"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.watch = Some(tx);
        debug!("Mock: watch opened with selector {:?}", field_selector);

        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    async fn create_binding(
        &self,
        namespace: &str,
        pod_name: &str,
        binding: &Binding,
    ) -> Result<()> {
        let _guard = InFlight::enter(self);
        self.simulate_latency().await;

        let node = binding.target.name.clone().unwrap_or_default();
        let key = format!("{}/{}", namespace, pod_name);

        let mut state = self.state.lock().await;
        state.calls.push(MockCall::CreateBinding {
            namespace: namespace.to_string(),
            pod: pod_name.to_string(),
            node: node.clone(),
        });

        if state.conflicting_pods.contains(&key) {
            return Err(ClientError::conflict("create binding", "binding rejected"));
        }

        let pod = state
            .pods
            .iter_mut()
            .find(|p| p.pod_key() == key)
            .ok_or_else(|| {
                ClientError::protocol("create binding", 404, format!("pods \"{}\" not found", key))
            })?;

        if let Some(current) = pod.assigned_node() {
            return Err(ClientError::conflict(
                "create binding",
                format!("pod {} is already assigned to node {}", key, current),
            ));
        }

        pod.spec.get_or_insert_with(Default::default).node_name = Some(node.clone());
        state.bindings.push((key, node));
        Ok(())
    }

    async fn create_event(&self, namespace: &str, event: &Event) -> Result<()> {
        let _guard = InFlight::enter(self);
        self.simulate_latency().await;

        let mut state = self.state.lock().await;
        state.calls.push(MockCall::CreateEvent {
            namespace: namespace.to_string(),
            involved: event.involved_object.name.clone().unwrap_or_default(),
        });

        if state.fail_events {
            return Err(ClientError::protocol("create event", 500, "internal error"));
        }
        state.events.push(event.clone());
        Ok(())
    }
}

/// A node advertising `cpu` allocatable
pub fn test_node(name: &str, cpu: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            allocatable: Some(BTreeMap::from([(
                "cpu".to_string(),
                Quantity(cpu.to_string()),
            )])),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A pending, unassigned pod with one container requesting `cpu`
pub fn test_pod(name: &str, namespace: &str, cpu: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}-{}", namespace, name)),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "app".to_string(),
                resources: Some(ResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        "cpu".to_string(),
                        Quantity(cpu.to_string()),
                    )])),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Pending".to_string()),
            ..Default::default()
        }),
    }
}

/// Mark `pod` as claimed by `scheduler_name`
pub fn claimed_by(mut pod: Pod, scheduler_name: &str) -> Pod {
    pod.metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(
            SCHEDULER_NAME_ANNOTATION.to_string(),
            scheduler_name.to_string(),
        );
    pod
}

/// Bind `pod` to `node` and mark it Running
pub fn running_on(mut pod: Pod, node: &str) -> Pod {
    pod.spec.get_or_insert_with(Default::default).node_name = Some(node.to_string());
    pod.status.get_or_insert_with(Default::default).phase = Some("Running".to_string());
    pod
}
