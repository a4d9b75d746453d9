use crate::types::ResourceUsage;
use crate::Result;
use lodestar_core::{Node, NodeExt, Pod, PodExt, ResourceQuantities};

/// Derive per-node CPU usage from the active pods.
///
/// Every listed node gets an entry. Pods assigned to a node that is not in
/// the snapshot still create an entry for it; unassigned pods add nothing.
pub fn compute_usage(nodes: &[Node], pods: &[Pod]) -> Result<ResourceUsage> {
    let mut usage = ResourceUsage::new();

    for node in nodes {
        usage.track(node.name_or_unknown());
    }

    for pod in pods {
        let Some(node_name) = pod.assigned_node() else {
            continue;
        };
        let requested = ResourceQuantities::pod_requests(pod)?;
        usage.add(node_name, requested.cpu_millicores)?;
    }

    Ok(usage)
}
