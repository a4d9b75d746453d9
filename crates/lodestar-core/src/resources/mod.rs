pub mod quantities;

pub use quantities::ResourceQuantities;

use k8s_openapi::api::core::v1::{Node, Pod};
use std::fmt;

/// Class of resource a pod can request and a node can advertise.
///
/// Only CPU is accounted for. New classes (e.g. GPUs) are added here and
/// picked up by the scheduler's advertisement precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Cpu,
}

impl ResourceClass {
    /// Every class the scheduler knows about
    pub const ALL: &'static [ResourceClass] = &[ResourceClass::Cpu];

    /// Key used in `requests` / `allocatable` maps
    pub fn key(&self) -> &'static str {
        match self {
            ResourceClass::Cpu => quantities::CPU,
        }
    }

    /// Whether any container of the pod requests this class
    pub fn requested_by(&self, pod: &Pod) -> bool {
        pod.spec.as_ref().is_some_and(|spec| {
            spec.containers.iter().any(|c| {
                c.resources
                    .as_ref()
                    .and_then(|r| r.requests.as_ref())
                    .is_some_and(|requests| requests.contains_key(self.key()))
            })
        })
    }

    /// Whether the node advertises this class as allocatable
    pub fn advertised_by(&self, node: &Node) -> bool {
        node.status
            .as_ref()
            .and_then(|s| s.allocatable.as_ref())
            .is_some_and(|allocatable| allocatable.contains_key(self.key()))
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, NodeStatus, PodSpec, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::BTreeMap;

    #[test]
    fn test_cpu_requested_by() {
        let mut pod = Pod::default();
        assert!(!ResourceClass::Cpu.requested_by(&pod));

        pod.spec = Some(PodSpec {
            containers: vec![Container {
                name: "app".to_string(),
                resources: Some(ResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        "cpu".to_string(),
                        Quantity("100m".to_string()),
                    )])),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        });
        assert!(ResourceClass::Cpu.requested_by(&pod));
    }

    #[test]
    fn test_cpu_advertised_by() {
        let mut node = Node::default();
        assert!(!ResourceClass::Cpu.advertised_by(&node));

        node.status = Some(NodeStatus {
            allocatable: Some(BTreeMap::from([(
                "cpu".to_string(),
                Quantity("4".to_string()),
            )])),
            ..Default::default()
        });
        assert!(ResourceClass::Cpu.advertised_by(&node));
    }

    #[test]
    fn test_display() {
        assert_eq!(ResourceClass::Cpu.to_string(), "cpu");
    }
}
