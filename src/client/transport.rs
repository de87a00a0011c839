//! # Transport
//!
//! Sends GraphQL mutations to the server and probes its reachability.
//!
//! Failures are classified exactly once, here, into [`TransportError`]. The
//! rest of the engine only ever matches on that enum and never inspects
//! HTTP responses itself.

use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Header marking a request replayed from the offline queue
pub const OFFLINE_OPERATION_HEADER: &str = "X-Offline-Operation";

/// Classified transport failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server could not be reached at all
    #[error("Network unavailable: {message}")]
    NetworkUnavailable { message: String },

    /// The server rejected the request (4xx other than 401)
    #[error("Request rejected with status {status}")]
    ClientRejected { status: u16 },

    /// The access token is no longer accepted (401)
    #[error("Access token expired")]
    AuthExpired,

    /// The server failed to handle the request (5xx)
    #[error("Server unavailable (status {status})")]
    ServerUnavailable { status: u16 },

    /// Anything else, including GraphQL errors in a successful response
    #[error("Unexpected transport error: {message}")]
    Unknown { message: String },
}

impl TransportError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkUnavailable {
            message: message.into(),
        }
    }

    /// Create an unclassified error
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Classify an HTTP status; `None` for success
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(Self::AuthExpired),
            400..=499 => Some(Self::ClientRejected { status }),
            500..=599 => Some(Self::ServerUnavailable { status }),
            _ => Some(Self::unknown(format!("unexpected status {}", status))),
        }
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16()).unwrap_or_else(|| Self::unknown(err.to_string()));
        }
        if err.is_connect() || err.is_timeout() || err.is_request() {
            return Self::network(err.to_string());
        }
        Self::unknown(err.to_string())
    }

    /// Whether the failure means the server is not reachable
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkUnavailable { .. })
    }
}

/// A mutation as sent over the wire
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    /// Operation name
    pub name: String,
    /// Serialized operation text
    pub body: String,
    pub variables: Map<String, Value>,
}

impl OperationRequest {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            variables: Map::new(),
        }
    }

    /// Add a variable
    pub fn variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

/// Per-request context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub access_token: Option<String>,
    /// Set on replays so the queue never intercepts its own traffic
    pub is_offline_operation: bool,
}

impl RequestContext {
    /// Context of a request issued by a caller
    pub fn live(access_token: Option<String>) -> Self {
        Self {
            access_token,
            is_offline_operation: false,
        }
    }

    /// Context of a request replayed from the queue
    pub fn offline_replay(access_token: Option<String>) -> Self {
        Self {
            access_token,
            is_offline_operation: true,
        }
    }
}

/// Sends mutations to the server
#[async_trait]
pub trait MutationTransport: Send + Sync {
    /// Send one mutation and return its `data`
    async fn send(
        &self,
        operation: &OperationRequest,
        context: &RequestContext,
    ) -> Result<Value, TransportError>;
}

/// Checks whether the server can be reached
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// GraphQL-over-HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport posting to `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl MutationTransport for HttpTransport {
    async fn send(
        &self,
        operation: &OperationRequest,
        context: &RequestContext,
    ) -> Result<Value, TransportError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CACHE_CONTROL, "no-cache")
            .json(&json!({
                "operationName": operation.name,
                "query": operation.body,
                "variables": operation.variables,
            }));

        if let Some(token) = &context.access_token {
            request = request.bearer_auth(token);
        }
        if context.is_offline_operation {
            request = request.header(OFFLINE_OPERATION_HEADER, "true");
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        if let Some(error) = TransportError::from_status(response.status().as_u16()) {
            tracing::debug!("[TRANSPORT] {} failed: {}", operation.name, error);
            return Err(error);
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| TransportError::unknown(format!("invalid response body: {}", e)))?;

        if let Some(error) = body.errors.into_iter().next() {
            return Err(TransportError::unknown(error.message));
        }

        Ok(body.data.unwrap_or(Value::Null))
    }
}

/// HEAD-request reachability probe
///
/// Any response counts as reachable, whatever its status.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    /// Create a probe for `url`; a probe taking longer than `timeout` fails
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn probe(&self) -> bool {
        match self
            .client
            .head(&self.url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
        {
            Ok(response) => {
                tracing::trace!("[NETWORK] ping status={}", response.status());
                true
            }
            Err(e) => {
                tracing::trace!("[NETWORK] ping error={}", e);
                false
            }
        }
    }
}
