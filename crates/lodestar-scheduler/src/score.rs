use crate::types::{SchedulingContext, ScoreResult};
use crate::{Result, SchedulerError};
use lodestar_core::{Node, NodeExt};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Node annotation holding the hourly price read by [`LowestPrice`]
pub const PRICE_ANNOTATION: &str = "lodestar.io/price";

/// Scoring function trait
pub trait ScoreFunction: Send + Sync {
    /// Score a node for the given pod (higher is better, None = cannot score)
    fn score(&self, context: &SchedulingContext, node: &Node) -> Option<i64>;

    /// Name of the scoring function
    fn name(&self) -> &str;
}

/// Prefer the node with the most CPU left after placing the pod
pub struct LeastAllocated;

impl ScoreFunction for LeastAllocated {
    fn score(&self, context: &SchedulingContext, node: &Node) -> Option<i64> {
        let free = context.free_cpu(node).ok()?;
        Some(free.saturating_sub(context.requested.cpu_millicores))
    }

    fn name(&self) -> &str {
        "LeastAllocated"
    }
}

/// Prefer the cheapest node according to a price annotation
pub struct LowestPrice {
    annotation: String,
}

impl Default for LowestPrice {
    fn default() -> Self {
        Self::new(PRICE_ANNOTATION)
    }
}

impl LowestPrice {
    pub fn new(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
        }
    }
}

impl ScoreFunction for LowestPrice {
    fn score(&self, _context: &SchedulingContext, node: &Node) -> Option<i64> {
        let price = node
            .annotation(&self.annotation)?
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite() && *p >= 0.0)?;

        // Thousandths keep fractional prices distinct
        Some(-((price * 1000.0).round() as i64))
    }

    fn name(&self) -> &str {
        "LowestPrice"
    }
}

/// Scoring policy selectable from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScorePolicy {
    #[default]
    LeastAllocated,
    LowestPrice,
}

impl ScorePolicy {
    pub fn scorer(&self) -> Box<dyn ScoreFunction> {
        match self {
            ScorePolicy::LeastAllocated => Box::new(LeastAllocated),
            ScorePolicy::LowestPrice => Box::new(LowestPrice::default()),
        }
    }
}

impl fmt::Display for ScorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScorePolicy::LeastAllocated => f.write_str("least-allocated"),
            ScorePolicy::LowestPrice => f.write_str("lowest-price"),
        }
    }
}

impl FromStr for ScorePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "least-allocated" => Ok(ScorePolicy::LeastAllocated),
            "lowest-price" => Ok(ScorePolicy::LowestPrice),
            other => Err(format!(
                "unknown score policy '{}' (expected least-allocated or lowest-price)",
                other
            )),
        }
    }
}

/// Higher scores first, unscorable nodes last, then node name ascending
fn rank(a: &ScoreResult, b: &ScoreResult) -> Ordering {
    let by_score = match (a.score, b.score) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_score.then_with(|| a.node_name.cmp(&b.node_name))
}

/// Pick the best candidate. Deterministic for identical input.
pub fn select_node(
    scorer: &dyn ScoreFunction,
    context: &SchedulingContext,
    candidates: &[Node],
) -> Result<Node> {
    let best = candidates
        .iter()
        .map(|node| {
            let result = ScoreResult::new(
                node.name_or_unknown().to_string(),
                scorer.score(context, node),
            );
            debug!(
                "Node {} scored {:?} by {}",
                result.node_name,
                result.score,
                scorer.name()
            );
            (node, result)
        })
        .min_by(|(_, a), (_, b)| rank(a, b))
        .map(|(node, _)| node.clone());

    best.ok_or_else(|| SchedulerError::internal_error("select_node called without candidates"))
}
