use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::traits::ClusterApi;
use crate::watch::{decode_watch_stream, WatchStream};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Binding, Event, Node, Pod};
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

const NODES_PATH: &str = "/api/v1/nodes";
const PODS_PATH: &str = "/api/v1/pods";

/// List envelope returned by collection endpoints
#[derive(Debug, Deserialize)]
struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// HTTP client for the Kubernetes API server
pub struct ApiClient {
    base_url: String,
    client: Client,
    token_path: Option<PathBuf>,
    request_timeout: Option<Duration>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(ca_path) = &config.ca_cert_path {
            let pem = std::fs::read(ca_path).map_err(|e| {
                ClientError::credentials(ca_path.display().to_string(), e.to_string())
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                ClientError::credentials(ca_path.display().to_string(), e.to_string())
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if config.insecure_skip_tls_verify {
            warn!(
                "TLS certificate verification is disabled for {}",
                config.api_server
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            ClientError::invalid_config(
                format!("failed to build HTTP client: {}", e),
                "Check the CA bundle and TLS settings",
            )
        })?;

        Ok(Self {
            base_url: config.api_server.trim_end_matches('/').to_string(),
            client,
            token_path: config.token_path.clone(),
            request_timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current bearer token; the file is re-read so rotated tokens are picked up
    async fn bearer_token(&self) -> Result<Option<String>> {
        let Some(path) = &self.token_path else {
            return Ok(None);
        };

        let token = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ClientError::credentials(path.display().to_string(), e.to_string()))?;

        Ok(Some(token.trim().to_string()))
    }

    /// Build an authenticated request. Streaming requests skip the timeout.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        streaming: bool,
    ) -> Result<RequestBuilder> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header(ACCEPT, "application/json, */*");

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.bearer_token().await? {
            request = request.bearer_auth(token);
        }
        if let (Some(timeout), false) = (self.request_timeout, streaming) {
            request = request.timeout(timeout);
        }

        Ok(request)
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| ClientError::transport(operation, e.to_string()))
    }

    /// Read the body of an unexpected response for the error message
    async fn unexpected(operation: &str, resp: Response) -> ClientError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            return ClientError::conflict(operation, body);
        }
        ClientError::protocol(operation, status.as_u16(), body)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let request = self.request(Method::GET, path, query, false).await?;
        let resp = self.send(operation, request).await?;

        if !resp.status().is_success() {
            return Err(Self::unexpected(operation, resp).await);
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| ClientError::transport(operation, e.to_string()))?;
        let list: ObjectList<T> = serde_json::from_slice(&body)
            .map_err(|e| ClientError::decode(format!("{} response", operation), e.to_string()))?;

        Ok(list.items)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<Response> {
        let request = self.request(Method::POST, path, &[], false).await?.json(body);
        self.send(operation, request).await
    }
}

#[async_trait]
impl ClusterApi for ApiClient {
    /// GET /api/v1/nodes
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.get_list("list nodes", NODES_PATH, &[]).await
    }

    /// GET /api/v1/pods?fieldSelector=...
    async fn list_pods(&self, field_selector: &str) -> Result<Vec<Pod>> {
        self.get_list("list pods", PODS_PATH, &[("fieldSelector", field_selector)])
            .await
    }

    /// GET /api/v1/pods?watch=true&fieldSelector=...
    async fn watch_pods(&self, field_selector: &str) -> Result<WatchStream<Pod>> {
        let operation = "watch pods";
        let request = self
            .request(
                Method::GET,
                PODS_PATH,
                &[("watch", "true"), ("fieldSelector", field_selector)],
                true,
            )
            .await?;
        let resp = self.send(operation, request).await?;

        if resp.status() != StatusCode::OK {
            return Err(Self::unexpected(operation, resp).await);
        }

        Ok(decode_watch_stream(resp.bytes_stream()))
    }

    /// POST /api/v1/namespaces/{namespace}/pods/{name}/binding
    async fn create_binding(
        &self,
        namespace: &str,
        pod_name: &str,
        binding: &Binding,
    ) -> Result<()> {
        let operation = "create binding";
        let path = format!("/api/v1/namespaces/{}/pods/{}/binding", namespace, pod_name);
        let resp = self.post(operation, &path, binding).await?;

        if !resp.status().is_success() {
            return Err(Self::unexpected(operation, resp).await);
        }
        Ok(())
    }

    /// POST /api/v1/namespaces/{namespace}/events
    async fn create_event(&self, namespace: &str, event: &Event) -> Result<()> {
        let operation = "create event";
        let path = format!("/api/v1/namespaces/{}/events", namespace);
        let resp = self.post(operation, &path, event).await?;

        if resp.status() != StatusCode::CREATED {
            return Err(Self::unexpected(operation, resp).await);
        }
        Ok(())
    }
}
