use k8s_openapi::api::core::v1::{Node, Pod};

/// Annotation a pod carries to select the scheduler responsible for it
pub const SCHEDULER_NAME_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/name";

/// Namespace assumed for pods that don't carry one
pub const DEFAULT_NAMESPACE: &str = "default";

const UNKNOWN: &str = "<unknown>";

/// Identity and scheduling-state accessors for pods
pub trait PodExt {
    /// Pod name, or a placeholder for logging when absent
    fn name_or_unknown(&self) -> &str;

    /// Pod namespace, falling back to `default`
    fn namespace_or_default(&self) -> &str;

    /// `namespace/name`, used as a stable identity in logs and de-duplication
    fn pod_key(&self) -> String;

    /// Node the pod is bound to, if `spec.nodeName` is set and non-empty
    fn assigned_node(&self) -> Option<&str>;

    /// Whether the pod still awaits a node
    fn is_unscheduled(&self) -> bool {
        self.assigned_node().is_none()
    }

    /// Whether the claim annotation names the given scheduler
    fn is_claimed_by(&self, scheduler_name: &str) -> bool;
}

impl PodExt for Pod {
    fn name_or_unknown(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or(UNKNOWN)
    }

    fn namespace_or_default(&self) -> &str {
        self.metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    fn pod_key(&self) -> String {
        format!("{}/{}", self.namespace_or_default(), self.name_or_unknown())
    }

    fn assigned_node(&self) -> Option<&str> {
        self.spec
            .as_ref()
            .and_then(|s| s.node_name.as_deref())
            .filter(|n| !n.is_empty())
    }

    fn is_claimed_by(&self, scheduler_name: &str) -> bool {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(SCHEDULER_NAME_ANNOTATION))
            .is_some_and(|name| name == scheduler_name)
    }
}

/// Identity accessors for nodes
pub trait NodeExt {
    /// Node name, or a placeholder for logging when absent
    fn name_or_unknown(&self) -> &str;

    /// Value of a metadata annotation
    fn annotation(&self, key: &str) -> Option<&str>;
}

impl NodeExt for Node {
    fn name_or_unknown(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or(UNKNOWN)
    }

    fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodSpec;
    use std::collections::BTreeMap;

    fn claimed_pod(scheduler: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = Some("web-0".to_string());
        pod.metadata.annotations = Some(BTreeMap::from([(
            SCHEDULER_NAME_ANNOTATION.to_string(),
            scheduler.to_string(),
        )]));
        pod
    }

    #[test]
    fn test_claimed_by() {
        let pod = claimed_pod("lodestar");
        assert!(pod.is_claimed_by("lodestar"));
        assert!(!pod.is_claimed_by("default-scheduler"));
        assert!(!Pod::default().is_claimed_by("lodestar"));
    }

    #[test]
    fn test_unscheduled_treats_empty_node_name_as_unset() {
        let mut pod = claimed_pod("lodestar");
        assert!(pod.is_unscheduled());

        pod.spec = Some(PodSpec {
            node_name: Some(String::new()),
            ..Default::default()
        });
        assert!(pod.is_unscheduled());

        pod.spec.as_mut().unwrap().node_name = Some("node-a".to_string());
        assert!(!pod.is_unscheduled());
        assert_eq!(pod.assigned_node(), Some("node-a"));
    }

    #[test]
    fn test_namespace_defaults() {
        let mut pod = claimed_pod("lodestar");
        assert_eq!(pod.namespace_or_default(), "default");
        assert_eq!(pod.pod_key(), "default/web-0");

        pod.metadata.namespace = Some("batch".to_string());
        assert_eq!(pod.pod_key(), "batch/web-0");
    }

    #[test]
    fn test_node_annotation() {
        let mut node = Node::default();
        assert_eq!(node.name_or_unknown(), "<unknown>");
        assert_eq!(node.annotation("price"), None);

        node.metadata.name = Some("node-a".to_string());
        node.metadata.annotations =
            Some(BTreeMap::from([("price".to_string(), "0.25".to_string())]));
        assert_eq!(node.name_or_unknown(), "node-a");
        assert_eq!(node.annotation("price"), Some("0.25"));
    }
}
