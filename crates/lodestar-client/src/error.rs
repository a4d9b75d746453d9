use miette::Diagnostic;
use thiserror::Error;

/// Error type for control-plane API calls
#[derive(Error, Debug, Diagnostic)]
pub enum ClientError {
    /// Connection or TLS failure
    #[error("{operation} failed: {message}")]
    #[diagnostic(
        code(lodestar::client::transport),
        help("Check that the API server is reachable and that its certificate is trusted")
    )]
    Transport {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        message: String,
    },

    /// The API server answered with a status the operation does not accept
    #[error("{operation} returned unexpected status {status}: {body}")]
    #[diagnostic(
        code(lodestar::client::protocol),
        help("Verify the service account has permission for this operation")
    )]
    Protocol {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        body: String,
    },

    /// The response payload could not be decoded
    #[error("Failed to decode {what}: {message}")]
    #[diagnostic(
        code(lodestar::client::decode),
        help("The API server returned a payload that does not match the expected schema")
    )]
    Decode {
        #[allow(unused)]
        what: String,
        #[allow(unused)]
        message: String,
    },

    /// The write was rejected because of a concurrent change (HTTP 409)
    #[error("{operation} conflicted with the current state: {body}")]
    #[diagnostic(
        code(lodestar::client::conflict),
        help("Another writer changed the object first; the next attempt will see the new state")
    )]
    Conflict {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        body: String,
    },

    /// Token or CA bundle could not be read
    #[error("Failed to read credentials from {path}: {message}")]
    #[diagnostic(
        code(lodestar::client::credentials),
        help("Mount the service account token or pass --token-file / --ca-file explicitly")
    )]
    Credentials {
        #[allow(unused)]
        path: String,
        #[allow(unused)]
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid client configuration: {message}")]
    #[diagnostic(code(lodestar::client::invalid_config), help("{suggestion}"))]
    InvalidConfig {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn protocol(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Protocol {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    pub fn decode(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn conflict(operation: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Conflict {
            operation: operation.into(),
            body: body.into(),
        }
    }

    pub fn credentials(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Credentials {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }
}
