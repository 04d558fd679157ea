//! # Remote Endpoint Client
//!
//! Thin HTTP wrapper over the control-plane API.
//!
//! ## Request Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  {base}/organizations/{org}/projects/{proj}/clusters/{cluster}         │
//! │        /appservices/{svc}/appEndpoints/{name}/...                      │
//! │                                                                         │
//! │  pause          DELETE  …/activationStatus                             │
//! │  resume         POST    …/activationStatus                             │
//! │  start_resync   POST    …/resync   { "scopes": { scope: [cols] } }     │
//! │  resync_status  GET     …/resync   → { "state": "...", ... }           │
//! │                                                                         │
//! │  publish fn     PUT     …/appEndpoints/{name}.{scope}.{col}            │
//! │                           /accessControlFunction   (raw source body)   │
//! │                                                                         │
//! │  Every request: Authorization: Bearer {api_key}, per-call timeout      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transport failures and non-2xx answers both come back as
//! [`EngineError::RemoteCallFailed`]. The client never retries; deciding what
//! a failure means is the state machine's job.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use url::Url;

use resync_core::RemoteOperation;

use crate::config::{ConnectionConfig, HttpSettings};
use crate::error::{EngineError, EngineResult};

// =============================================================================
// Wire Types
// =============================================================================

/// Body of a start-resync request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResyncRequest<'a> {
    pub scopes: BTreeMap<&'a str, &'a [String]>,
}

impl<'a> ResyncRequest<'a> {
    pub fn new(scope: &'a str, collections: &'a [String]) -> Self {
        let mut scopes = BTreeMap::new();
        scopes.insert(scope, collections);
        ResyncRequest { scopes }
    }
}

/// A resync status response.
///
/// Only `state` is interpreted; every other field is kept for logging.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResyncStatusReport {
    #[serde(default)]
    pub state: Option<String>,

    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl ResyncStatusReport {
    /// Parses a response body. Anything that is not a JSON object yields a
    /// report without a state.
    pub fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

// =============================================================================
// Client Traits
// =============================================================================

/// The four control-plane operations the resync cycle needs.
#[async_trait]
pub trait RemoteEndpointClient: Send + Sync {
    /// Disables activation on the endpoint.
    async fn pause(&self, endpoint: &str) -> EngineResult<()>;

    /// Re-enables activation on the endpoint.
    async fn resume(&self, endpoint: &str) -> EngineResult<()>;

    /// Submits an asynchronous resync job for `collections` under `scope`.
    async fn start_resync(
        &self,
        endpoint: &str,
        scope: &str,
        collections: &[String],
    ) -> EngineResult<()>;

    /// Fetches the current resync job status.
    async fn resync_status(&self, endpoint: &str) -> EngineResult<ResyncStatusReport>;
}

/// Publishes access-control functions ahead of a resync.
#[async_trait]
pub trait AccessFunctionPublisher: Send + Sync {
    async fn publish_access_function(
        &self,
        endpoint: &str,
        scope: &str,
        collection: &str,
        source: &str,
    ) -> EngineResult<()>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// reqwest-backed control-plane client.
#[derive(Debug, Clone)]
pub struct HttpEndpointClient {
    http: Client,
    base: Url,
    connection: ConnectionConfig,
}

impl HttpEndpointClient {
    /// Creates a client. Fails if the base URL is unusable or the HTTP
    /// client cannot be built.
    pub fn new(connection: ConnectionConfig, settings: &HttpSettings) -> EngineResult<Self> {
        let base = connection.base()?;

        let http = Client::builder()
            .timeout(settings.request_timeout())
            .connect_timeout(settings.connect_timeout())
            .user_agent(concat!("resync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EngineError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(HttpEndpointClient {
            http,
            base,
            connection,
        })
    }

    /// Builds `{base}/organizations/…/appEndpoints/{endpoint}/{tail…}`.
    ///
    /// Each identifier is pushed as one path segment, so reserved characters
    /// are percent-escaped rather than interpreted.
    pub fn endpoint_url(&self, endpoint: &str, tail: &[&str]) -> Url {
        let c = &self.connection;
        let mut url = self.base.clone();
        {
            // `base()` rejected cannot-be-a-base URLs, so segments are available.
            if let Ok(mut segments) = url.path_segments_mut() {
                segments
                    .pop_if_empty()
                    .extend([
                        "organizations",
                        c.organization_id.as_str(),
                        "projects",
                        c.project_id.as_str(),
                        "clusters",
                        c.cluster_id.as_str(),
                        "appservices",
                        c.app_service_id.as_str(),
                        "appEndpoints",
                        endpoint,
                    ])
                    .extend(tail);
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.connection.api_key)
    }

    /// Sends a request and maps transport errors and non-2xx statuses.
    async fn send(
        &self,
        operation: RemoteOperation,
        endpoint: &str,
        request: RequestBuilder,
    ) -> EngineResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| EngineError::remote(operation, endpoint, e))?;

        let status = response.status();
        if status.is_success() {
            debug!(endpoint, %operation, status = status.as_u16(), "Remote call succeeded");
            return Ok(response);
        }

        let body = error_body(operation, endpoint, response.text().await);
        Err(EngineError::RemoteCallFailed {
            operation,
            endpoint: endpoint.to_string(),
            status: Some(status.as_u16()),
            message: format!("HTTP {}: {}", status, truncate(&body, 200)),
        })
    }
}

#[async_trait]
impl RemoteEndpointClient for HttpEndpointClient {
    async fn pause(&self, endpoint: &str) -> EngineResult<()> {
        let url = self.endpoint_url(endpoint, &["activationStatus"]);
        self.send(
            RemoteOperation::Pause,
            endpoint,
            self.request(Method::DELETE, url),
        )
        .await?;
        debug!(endpoint, "Endpoint paused");
        Ok(())
    }

    async fn resume(&self, endpoint: &str) -> EngineResult<()> {
        let url = self.endpoint_url(endpoint, &["activationStatus"]);
        self.send(
            RemoteOperation::Resume,
            endpoint,
            self.request(Method::POST, url),
        )
        .await?;
        debug!(endpoint, "Endpoint resumed");
        Ok(())
    }

    async fn start_resync(
        &self,
        endpoint: &str,
        scope: &str,
        collections: &[String],
    ) -> EngineResult<()> {
        let url = self.endpoint_url(endpoint, &["resync"]);
        let body = ResyncRequest::new(scope, collections);
        self.send(
            RemoteOperation::StartResync,
            endpoint,
            self.request(Method::POST, url).json(&body),
        )
        .await?;
        debug!(endpoint, scope, collections = collections.len(), "Resync triggered");
        Ok(())
    }

    async fn resync_status(&self, endpoint: &str) -> EngineResult<ResyncStatusReport> {
        let url = self.endpoint_url(endpoint, &["resync"]);
        let response = self
            .send(
                RemoteOperation::ResyncStatus,
                endpoint,
                self.request(Method::GET, url),
            )
            .await?;

        let body = response
            .text()
            .await
            .map_err(|e| EngineError::remote(RemoteOperation::ResyncStatus, endpoint, e))?;

        let report = ResyncStatusReport::from_body(&body);
        debug!(endpoint, state = ?report.state, details = ?report.details, "Resync status");
        Ok(report)
    }
}

#[async_trait]
impl AccessFunctionPublisher for HttpEndpointClient {
    async fn publish_access_function(
        &self,
        endpoint: &str,
        scope: &str,
        collection: &str,
        source: &str,
    ) -> EngineResult<()> {
        let keyspace = format!("{}.{}.{}", endpoint, scope, collection);
        let url = self.endpoint_url(&keyspace, &["accessControlFunction"]);

        self.send(
            RemoteOperation::PublishFunction,
            endpoint,
            self.request(Method::PUT, url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(source.to_string()),
        )
        .await?;
        info!(endpoint, scope, collection, "Access function deployed");
        Ok(())
    }
}

/// Body of a non-2xx response, empty when it could not be read.
fn error_body<E: std::fmt::Display>(
    operation: RemoteOperation,
    endpoint: &str,
    body: Result<String, E>,
) -> String {
    match body {
        Ok(body) => body,
        Err(e) => {
            debug!(endpoint, %operation, error = %e, "Failed to read error response body");
            String::new()
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
