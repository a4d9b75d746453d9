use crate::accountant::compute_usage;
use crate::types::{FilterResult, FitOutcome, ResourceUsage, SchedulingContext};
use crate::Result;
use lodestar_core::{Node, NodeExt, Pod, ResourceQuantities};
use tracing::debug;

/// Filter predicate trait
pub trait FilterPredicate: Send + Sync {
    /// Filter a node for the given pod. Errors abort the whole fit.
    fn filter(&self, context: &SchedulingContext, node: &Node) -> Result<FilterResult>;

    /// Name of the filter
    fn name(&self) -> &str;
}

/// Rejects nodes whose free CPU is below the pod's request
pub struct PodFitsCpu;

impl FilterPredicate for PodFitsCpu {
    fn filter(&self, context: &SchedulingContext, node: &Node) -> Result<FilterResult> {
        let node_name = node.name_or_unknown().to_string();
        let requested = context.requested.cpu_millicores;
        let free = context.free_cpu(node)?;

        debug!(
            "Node {} has {} milli free, pod requests {} milli",
            node_name, free, requested
        );

        if requested > free {
            let reason = format!(
                "insufficient CPU on node {}: requested {}, free {}",
                node_name,
                ResourceQuantities::format_cpu(requested),
                ResourceQuantities::format_cpu(free)
            );
            return Ok(FilterResult::fail(node_name, reason));
        }

        Ok(FilterResult::pass(node_name))
    }

    fn name(&self) -> &str {
        "PodFitsCpu"
    }
}

/// Get default filter predicates
pub fn default_filters() -> Vec<Box<dyn FilterPredicate>> {
    vec![Box::new(PodFitsCpu)]
}

/// Runs the precondition check and every predicate against each node
pub struct FitFilter {
    predicates: Vec<Box<dyn FilterPredicate>>,
}

impl Default for FitFilter {
    fn default() -> Self {
        Self::new(default_filters())
    }
}

impl FitFilter {
    pub fn new(predicates: Vec<Box<dyn FilterPredicate>>) -> Self {
        Self { predicates }
    }

    pub fn fit(&self, context: &SchedulingContext) -> Result<FitOutcome> {
        if let Some(class) = context.unadvertised_class() {
            debug!("No node advertises {}", class);
            return Ok(FitOutcome {
                unadvertised: Some(class),
                ..Default::default()
            });
        }

        let mut outcome = FitOutcome::default();

        'nodes: for node in &context.nodes {
            for predicate in &self.predicates {
                let result = predicate.filter(context, node)?;
                if !result.passed {
                    debug!(
                        "Node {} filtered out by {}: {}",
                        result.node_name,
                        predicate.name(),
                        result.reason.as_deref().unwrap_or_default()
                    );
                    outcome.failures.push(result);
                    continue 'nodes;
                }
            }
            outcome.candidates.push(node.clone());
        }

        Ok(outcome)
    }
}

/// Fit `pod` against `nodes` given current usage, with the default predicates
pub fn fit(pod: &Pod, nodes: &[Node], usage: &ResourceUsage) -> Result<FitOutcome> {
    let context = SchedulingContext::new(pod.clone(), nodes.to_vec(), usage.clone())?;
    FitFilter::default().fit(&context)
}

/// Fit `pod` against `nodes`, deriving usage from `active_pods`
pub fn fit_with_pods(pod: &Pod, nodes: &[Node], active_pods: &[Pod]) -> Result<FitOutcome> {
    let usage = compute_usage(nodes, active_pods)?;
    fit(pod, nodes, &usage)
}
