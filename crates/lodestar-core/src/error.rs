// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while interpreting Kubernetes resource fields
#[derive(Error, Debug, Diagnostic)]
pub enum ResourceError {
    /// A resource quantity is not in a recognized unit form
    #[error("Invalid {resource} quantity '{value}': {reason}")]
    #[diagnostic(
        code(lodestar::invalid_quantity),
        help("CPU quantities must be millicores (\"500m\") or cores (\"2\", \"0.5\")")
    )]
    InvalidQuantity {
        #[allow(unused)]
        resource: String,
        #[allow(unused)]
        value: String,
        #[allow(unused)]
        reason: String,
    },

    /// A field the scheduler depends on is absent
    #[error("Missing required field: {field}")]
    #[diagnostic(
        code(lodestar::missing_field),
        help("The object returned by the API server is incomplete")
    )]
    MissingField {
        #[allow(unused)]
        field: String,
    },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, ResourceError>;

impl ResourceError {
    /// Create an InvalidQuantity error
    pub fn invalid_quantity(
        resource: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidQuantity {
            resource: resource.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}
