use crate::error::{ClientError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory the kubelet mounts service account credentials into
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Configuration for [`ApiClient`](crate::ApiClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API server base URL (e.g., "https://10.96.0.1:443")
    pub api_server: String,
    /// File holding the bearer token; re-read on every request
    pub token_path: Option<PathBuf>,
    /// PEM bundle trusted in addition to the system roots
    pub ca_cert_path: Option<PathBuf>,
    /// Accept any server certificate. Off unless explicitly requested.
    pub insecure_skip_tls_verify: bool,
    /// Per-request timeout for non-streaming calls (None = no timeout)
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_server: impl Into<String>) -> Self {
        Self {
            api_server: api_server.into(),
            token_path: None,
            ca_cert_path: None,
            insecure_skip_tls_verify: false,
            request_timeout: None,
        }
    }

    /// Build the configuration a pod sees from inside the cluster.
    ///
    /// The API address comes from `KUBERNETES_SERVICE_HOST`/`_PORT`; the
    /// token and CA bundle are used if the service account volume is mounted.
    pub fn in_cluster() -> Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
            ClientError::invalid_config(
                "KUBERNETES_SERVICE_HOST is not set",
                "Run inside a cluster or pass --api-server",
            )
        })?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());

        Ok(Self::new(api_server_url(&host, &port)).with_service_account_dir(SERVICE_ACCOUNT_DIR))
    }

    /// Use the token and CA bundle found in `dir`, when they exist and no
    /// explicit path was set
    pub fn with_service_account_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let token = dir.join("token");
        let ca = dir.join("ca.crt");

        if self.token_path.is_none() && token.exists() {
            self.token_path = Some(token);
        }
        if self.ca_cert_path.is_none() && ca.exists() {
            self.ca_cert_path = Some(ca);
        }
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    pub fn with_ca_cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    pub fn with_insecure_skip_tls_verify(mut self, insecure: bool) -> Self {
        self.insecure_skip_tls_verify = insecure;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Format `https://host:port`, bracketing IPv6 literals
fn api_server_url(host: &str, port: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("https://[{}]:{}", host, port)
    } else {
        format!("https://{}:{}", host, port)
    }
}
