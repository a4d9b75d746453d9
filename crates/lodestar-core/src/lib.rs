//! Lodestar Core - Fundamental types for the Lodestar pod scheduler
//!
//! This crate provides:
//! - CPU quantity normalization (millicores)
//! - Pod claim and identity helpers
//! - Watch event wire types
//! - Error types with miette diagnostics

pub mod error;
pub mod events;
pub mod resources;
pub mod types;

// Re-export commonly used types
pub use error::{ResourceError, Result};
pub use events::{WatchEvent, WatchEventType};
pub use resources::{ResourceClass, ResourceQuantities};
pub use types::{NodeExt, PodExt, DEFAULT_NAMESPACE, SCHEDULER_NAME_ANNOTATION};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{Binding, Event, Node, Pod};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
