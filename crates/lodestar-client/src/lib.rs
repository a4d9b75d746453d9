// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

//! Lodestar Client - Control-plane access for the Lodestar scheduler
//!
//! `ClusterApi` is the seam between the scheduler and the API server.
//! `ApiClient` implements it over HTTPS; `MockCluster` implements it in memory.

pub mod api_client;
pub mod config;
pub mod error;
pub mod mock;
pub mod traits;
pub mod watch;

// Re-export primary types
pub use api_client::ApiClient;
pub use config::{ClientConfig, SERVICE_ACCOUNT_DIR};
pub use error::{ClientError, Result};
pub use mock::{claimed_by, running_on, test_node, test_pod, MockCall, MockCluster};
pub use traits::{selectors, ClusterApi};
pub use watch::{decode_watch_stream, WatchStream};
