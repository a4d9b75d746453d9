use crate::{Result, SchedulerError};
use lodestar_core::{Node, NodeExt, Pod, ResourceClass, ResourceError, ResourceQuantities};
use std::collections::BTreeMap;

/// CPU already consumed per node, in millicores
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    consumed: BTreeMap<String, i64>,
}

impl ResourceUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `node` has an entry, starting at zero
    pub fn track(&mut self, node: impl Into<String>) {
        self.consumed.entry(node.into()).or_insert(0);
    }

    /// Charge `millicores` to `node`. Fails if the node's total overflows.
    pub fn add(&mut self, node: impl Into<String>, millicores: i64) -> Result<()> {
        let consumed = self.consumed.entry(node.into()).or_insert(0);
        *consumed = ResourceQuantities::add_cpu(*consumed, millicores)?;
        Ok(())
    }

    /// Millicores consumed on `node` (0 for unknown nodes)
    pub fn consumed(&self, node: &str) -> i64 {
        self.consumed.get(node).copied().unwrap_or(0)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.consumed.contains_key(node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.consumed.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.consumed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}

/// Scheduling context containing the pod, the node snapshot and current usage
#[derive(Debug, Clone)]
pub struct SchedulingContext {
    /// Pod to be scheduled
    pub pod: Pod,
    /// Nodes listed for this attempt
    pub nodes: Vec<Node>,
    /// Usage derived from the active pods
    pub usage: ResourceUsage,
    /// What the pod requests
    pub requested: ResourceQuantities,
}

impl SchedulingContext {
    /// Create a new scheduling context. Fails if the pod's requests don't parse.
    pub fn new(pod: Pod, nodes: Vec<Node>, usage: ResourceUsage) -> Result<Self> {
        let requested = ResourceQuantities::pod_requests(&pod)?;
        Ok(Self {
            pod,
            nodes,
            usage,
            requested,
        })
    }

    /// Allocatable CPU on `node` minus what is already placed there
    pub fn free_cpu(&self, node: &Node) -> Result<i64> {
        let allocatable = ResourceQuantities::node_allocatable(node)?;
        let consumed = self.usage.consumed(node.name_or_unknown());
        allocatable
            .cpu_millicores
            .checked_sub(consumed)
            .ok_or_else(|| {
                SchedulerError::from(ResourceError::invalid_quantity(
                    ResourceClass::Cpu.to_string(),
                    format!("{}m - {}m", allocatable.cpu_millicores, consumed),
                    "free CPU out of range",
                ))
            })
    }

    /// First class the pod requests that no listed node advertises
    pub fn unadvertised_class(&self) -> Option<ResourceClass> {
        ResourceClass::ALL.iter().copied().find(|class| {
            class.requested_by(&self.pod) && !self.nodes.iter().any(|n| class.advertised_by(n))
        })
    }
}

/// Result of filtering a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    /// Node name
    pub node_name: String,
    /// Whether the node passed the filter
    pub passed: bool,
    /// Reason for failure (if any)
    pub reason: Option<String>,
}

impl FilterResult {
    /// Create a passing filter result
    pub fn pass(node_name: String) -> Self {
        Self {
            node_name,
            passed: true,
            reason: None,
        }
    }

    /// Create a failing filter result
    pub fn fail(node_name: String, reason: String) -> Self {
        Self {
            node_name,
            passed: false,
            reason: Some(reason),
        }
    }
}

/// Result of scoring a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreResult {
    /// Node name
    pub node_name: String,
    /// Score (higher is better, None if the node could not be scored)
    pub score: Option<i64>,
}

impl ScoreResult {
    pub fn new(node_name: String, score: Option<i64>) -> Self {
        Self { node_name, score }
    }
}

/// Outcome of the fit filter for one pod
#[derive(Debug, Clone, Default)]
pub struct FitOutcome {
    /// Nodes the pod fits on
    pub candidates: Vec<Node>,
    /// One entry per rejected node
    pub failures: Vec<FilterResult>,
    /// Set when the precondition check rejected every node at once
    pub unadvertised: Option<ResourceClass>,
}

impl FitOutcome {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Human-readable rejection reasons, one per line in the event message
    pub fn failure_reasons(&self) -> Vec<String> {
        if let Some(class) = self.unadvertised {
            return vec![format!("no node advertises {}", class)];
        }
        self.failures
            .iter()
            .filter_map(|f| f.reason.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_client::{test_node, test_pod};

    #[test]
    fn test_resource_usage() {
        let mut usage = ResourceUsage::new();
        usage.track("node-1");
        usage.add("node-2", 250).unwrap();
        usage.add("node-2", 250).unwrap();

        assert_eq!(usage.consumed("node-1"), 0);
        assert_eq!(usage.consumed("node-2"), 500);
        assert_eq!(usage.consumed("node-3"), 0);
        assert!(usage.contains("node-1"));
        assert!(!usage.contains("node-3"));
        assert_eq!(usage.len(), 2);
    }

    #[test]
    fn test_resource_usage_overflow_is_an_error() {
        let mut usage = ResourceUsage::new();
        usage.add("node-1", i64::MAX).unwrap();

        let err = usage.add("node-1", 1).unwrap_err();
        assert!(matches!(err, SchedulerError::Resource(_)));
        assert_eq!(usage.consumed("node-1"), i64::MAX);
    }

    #[test]
    fn test_free_cpu() {
        let mut usage = ResourceUsage::new();
        usage.add("node-1", 500).unwrap();
        let ctx = SchedulingContext::new(
            test_pod("web", "default", "1"),
            vec![test_node("node-1", "2")],
            usage,
        )
        .unwrap();

        assert_eq!(ctx.requested.cpu_millicores, 1000);
        assert_eq!(ctx.free_cpu(&ctx.nodes[0]).unwrap(), 1500);
    }

    #[test]
    fn test_context_rejects_bad_request() {
        let result = SchedulingContext::new(
            test_pod("web", "default", "lots"),
            vec![],
            ResourceUsage::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_failure_reasons_prefer_precondition() {
        let outcome = FitOutcome {
            candidates: vec![],
            failures: vec![FilterResult::fail("n".to_string(), "ignored".to_string())],
            unadvertised: Some(ResourceClass::Cpu),
        };
        assert_eq!(outcome.failure_reasons(), vec!["no node advertises cpu"]);
    }
}
