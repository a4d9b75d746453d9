use crate::error::Result;
use crate::watch::WatchStream;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Binding, Event, Node, Pod};

/// Field selectors understood by the pods endpoints
pub mod selectors {
    /// Pods with no node assigned
    pub const UNSCHEDULED: &str = "spec.nodeName=";
    /// Pods in the Running phase
    pub const PHASE_RUNNING: &str = "status.phase=Running";
    /// Pods in the Pending phase
    pub const PHASE_PENDING: &str = "status.phase=Pending";
}

/// Operations the scheduler needs from the control plane.
///
/// `ApiClient` talks to a real API server; `MockCluster` keeps everything in
/// memory for tests.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List every node
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// List pods across all namespaces matching a field selector
    async fn list_pods(&self, field_selector: &str) -> Result<Vec<Pod>>;

    /// Open a watch on pods matching a field selector.
    ///
    /// The stream ends after the first error item; dropping it closes the
    /// underlying connection.
    async fn watch_pods(&self, field_selector: &str) -> Result<WatchStream<Pod>>;

    /// Bind a pod to a node via the binding subresource.
    ///
    /// Returns `ClientError::Conflict` when the API server reports 409.
    async fn create_binding(&self, namespace: &str, pod_name: &str, binding: &Binding)
        -> Result<()>;

    /// Post an event; anything other than 201 Created is an error
    async fn create_event(&self, namespace: &str, event: &Event) -> Result<()>;
}
