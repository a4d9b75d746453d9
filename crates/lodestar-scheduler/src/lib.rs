//! Lodestar Scheduler - Pod to Node scheduling
//!
//! This crate provides:
//! - Resource accounting over the active pods
//! - Fit filter predicates and pluggable scoring policies
//! - Binding and FailedScheduling event recording
//! - The scheduling actor, fed by the pod watch and the reconcile loop

pub mod accountant;
pub mod actor;
pub mod bind;
pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod reconcile;
pub mod recorder;
pub mod score;
pub mod supervisor;
pub mod types;
pub mod watch;

// Re-export commonly used types
pub use actor::{SchedulerHandle, SchedulingActor, SweepReport, WorkItem};
pub use config::{SchedulerConfig, DEFAULT_SCHEDULER_NAME};
pub use error::{Result, SchedulerError};
pub use filter::{fit, FilterPredicate, FitFilter, PodFitsCpu};
pub use pipeline::SchedulingPipeline;
pub use reconcile::ReconcileLoop;
pub use recorder::EventRecorder;
pub use score::{select_node, LeastAllocated, LowestPrice, ScoreFunction, ScorePolicy};
pub use supervisor::Supervisor;
pub use types::{FilterResult, FitOutcome, ResourceUsage, SchedulingContext, ScoreResult};
pub use watch::{WatchDispatcher, WatchState};
