use crate::Result;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{EventSource, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use lodestar_client::ClusterApi;
use lodestar_core::{Event, ObjectMeta, Pod, PodExt};
use std::sync::Arc;
use tracing::debug;

/// Event reason posted when no node fits a pod
pub const FAILED_SCHEDULING: &str = "FailedScheduling";

/// Build the Warning event explaining why `pod` fits nowhere
pub fn fit_failure_event(
    pod: &Pod,
    reasons: &[String],
    scheduler_name: &str,
    now: DateTime<Utc>,
) -> Event {
    let name = pod.name_or_unknown();
    let mut message = format!("pod ({}) failed to fit in any node", name);
    for reason in reasons {
        message.push('\n');
        message.push_str(reason);
    }

    Event {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", name)),
            namespace: Some(pod.namespace_or_default().to_string()),
            ..Default::default()
        },
        involved_object: ObjectReference {
            kind: Some("Pod".to_string()),
            name: pod.metadata.name.clone(),
            namespace: Some(pod.namespace_or_default().to_string()),
            uid: pod.metadata.uid.clone(),
            ..Default::default()
        },
        reason: Some(FAILED_SCHEDULING.to_string()),
        message: Some(message),
        type_: Some("Warning".to_string()),
        count: Some(1),
        first_timestamp: Some(Time(now)),
        last_timestamp: Some(Time(now)),
        source: Some(EventSource {
            component: Some(scheduler_name.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Posts scheduling events to the pod's namespace
pub struct EventRecorder {
    api: Arc<dyn ClusterApi>,
    scheduler_name: String,
}

impl EventRecorder {
    pub fn new(api: Arc<dyn ClusterApi>, scheduler_name: impl Into<String>) -> Self {
        Self {
            api,
            scheduler_name: scheduler_name.into(),
        }
    }

    pub async fn record_fit_failure(&self, pod: &Pod, reasons: &[String]) -> Result<()> {
        let event = fit_failure_event(pod, reasons, &self.scheduler_name, Utc::now());
        self.api
            .create_event(pod.namespace_or_default(), &event)
            .await?;
        debug!("Recorded {} event for pod {}", FAILED_SCHEDULING, pod.pod_key());
        Ok(())
    }
}
