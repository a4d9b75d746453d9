use crate::{Result, SchedulerError};
use k8s_openapi::api::core::v1::ObjectReference;
use lodestar_client::{ClientError, ClusterApi};
use lodestar_core::{Binding, ObjectMeta, Pod, PodExt};
use std::sync::Arc;
use tracing::info;

/// Binding of `pod` to `node_name` for the pod's binding subresource
pub fn build_binding(pod: &Pod, node_name: &str) -> Binding {
    Binding {
        metadata: ObjectMeta {
            name: pod.metadata.name.clone(),
            namespace: Some(pod.namespace_or_default().to_string()),
            ..Default::default()
        },
        target: ObjectReference {
            api_version: Some("v1".to_string()),
            kind: Some("Node".to_string()),
            name: Some(node_name.to_string()),
            ..Default::default()
        },
    }
}

/// Commits placement decisions
pub struct Binder {
    api: Arc<dyn ClusterApi>,
}

impl Binder {
    pub fn new(api: Arc<dyn ClusterApi>) -> Self {
        Self { api }
    }

    /// Bind `pod` to `node_name`. A 409 becomes `SchedulerError::BindConflict`.
    pub async fn bind(&self, pod: &Pod, node_name: &str) -> Result<()> {
        let binding = build_binding(pod, node_name);

        match self
            .api
            .create_binding(pod.namespace_or_default(), pod.name_or_unknown(), &binding)
            .await
        {
            Ok(()) => {
                info!("Bound pod {} to node {}", pod.pod_key(), node_name);
                Ok(())
            }
            Err(ClientError::Conflict { body, .. }) => Err(SchedulerError::bind_conflict(
                pod.pod_key(),
                node_name,
                body,
            )),
            Err(e) => Err(e.into()),
        }
    }
}
