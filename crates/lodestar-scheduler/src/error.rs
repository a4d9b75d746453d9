// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use lodestar_client::ClientError;
use lodestar_core::ResourceError;
use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// No node can take the pod
    #[error("No node fits pod {pod}")]
    #[diagnostic(
        code(lodestar::scheduler::no_fit),
        help("Free up CPU on a node or add capacity; the pod is retried on the next reconcile")
    )]
    NoFit {
        #[allow(unused)]
        pod: String,
        #[allow(unused)]
        reasons: Vec<String>,
    },

    /// The binding was rejected because the pod changed concurrently
    #[error("Binding pod {pod} to node {node} conflicted: {message}")]
    #[diagnostic(
        code(lodestar::scheduler::bind_conflict),
        help("Another scheduler or a previous attempt already bound the pod")
    )]
    BindConflict {
        #[allow(unused)]
        pod: String,
        #[allow(unused)]
        node: String,
        #[allow(unused)]
        message: String,
    },

    /// Malformed resource quantity or missing field
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resource(#[from] ResourceError),

    /// Control-plane call failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Client(#[from] ClientError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(lodestar::scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    Internal {
        #[allow(unused)]
        message: String,
    },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create a NoFit error
    pub fn no_fit(pod: impl Into<String>, reasons: Vec<String>) -> Self {
        Self::NoFit {
            pod: pod.into(),
            reasons,
        }
    }

    /// Create a BindConflict error
    pub fn bind_conflict(
        pod: impl Into<String>,
        node: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::BindConflict {
            pod: pod.into(),
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create an Internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Outcomes that happen in normal operation and need no operator attention
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NoFit { .. } | Self::BindConflict { .. })
    }

    /// Whether a later attempt on the same pod can succeed without a config change
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NoFit { .. } | Self::BindConflict { .. } => true,
            Self::Client(err) => !matches!(err, ClientError::InvalidConfig { .. }),
            Self::Resource(_) | Self::Internal { .. } => false,
        }
    }
}
