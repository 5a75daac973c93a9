//! Proxmox VE API client
//!
//! A thin wrapper over `reqwest` speaking the `/api2/json` REST API with API
//! token authentication. Subsystem clients are reached by narrowing:
//! `client.cluster().ha().groups()`.

pub mod cluster;
pub mod ha;
pub mod types;

use std::time::Duration;

use log::debug;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use cluster::ClusterClient;

/// Errors returned by the API client
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint is not an absolute http(s) URL
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The API token does not look like `USER@REALM!TOKENID=SECRET`
    #[error("Invalid API token: expected format USER@REALM!TOKENID=SECRET")]
    InvalidToken,

    /// The underlying HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// Connection, timeout or body transfer failure
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status
    #[error("Received HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    /// The response body could not be decoded
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response envelope had no `data` member
    #[error("The server did not include a data object in the response from {url}")]
    MissingData { url: String },

    /// The caller cancelled the request
    #[error("Request to {url} was cancelled")]
    Cancelled { url: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Well-formed API token used by tests against a mock server
#[cfg(test)]
pub(crate) const TEST_TOKEN: &str = "terraform@pve!provider=00000000-0000-0000-0000-000000000000";

/// Connection settings for [`Client`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API (e.g., "https://pve.example.com:8006")
    pub endpoint: String,
    /// API token in the form `USER@REALM!TOKENID=SECRET`
    pub api_token: String,
    /// Accept self-signed certificates
    pub insecure: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            insecure: false,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `{"data": ...}` envelope every API response is wrapped in
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
}

/// Shared HTTP connection to a Proxmox VE API endpoint
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let base_url = parse_endpoint(&config.endpoint)?;
        validate_token(&config.api_token)?;

        let mut auth = HeaderValue::from_str(&format!("PVEAPIToken={}", config.api_token))
            .map_err(|_| ClientError::InvalidToken)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self { http, base_url })
    }

    /// Client for the `cluster` API subtree
    pub fn cluster(&self) -> ClusterClient {
        ClusterClient::new(self.clone())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the URL of an API path given as segments below `/api2/json`
    pub(crate) fn url_for(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidEndpoint {
                endpoint: self.base_url.to_string(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(["api2", "json"])
            .extend(segments);
        Ok(url)
    }

    /// GET an API path and decode the `data` member of the response
    pub(crate) async fn get_data<T: DeserializeOwned>(
        &self,
        ctx: &CancellationToken,
        segments: &[&str],
    ) -> ClientResult<T> {
        let url = self.url_for(segments)?;
        let url_str = url.to_string();

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(ClientError::Cancelled { url: url_str }),
            result = self.fetch(url) => result,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> ClientResult<T> {
        let url_str = url.to_string();
        debug!("GET {}", url_str);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::Request {
                url: url_str.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::Request {
                url: url_str.clone(),
                source,
            })?;
        debug!("GET {} -> {} ({} bytes)", url_str, status, body.len());

        if !status.is_success() {
            return Err(ClientError::Status {
                url: url_str,
                status,
                body,
            });
        }

        let envelope: DataEnvelope<T> =
            serde_json::from_str(&body).map_err(|source| ClientError::Decode {
                url: url_str.clone(),
                source,
            })?;

        envelope
            .data
            .ok_or(ClientError::MissingData { url: url_str })
    }
}

fn parse_endpoint(endpoint: &str) -> ClientResult<Url> {
    let invalid = |reason: &str| ClientError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(invalid("scheme must be http or https")),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

fn validate_token(token: &str) -> ClientResult<()> {
    let Some((token_id, secret)) = token.split_once('=') else {
        return Err(ClientError::InvalidToken);
    };
    let Some((user, name)) = token_id.split_once('!') else {
        return Err(ClientError::InvalidToken);
    };
    if secret.is_empty() || name.is_empty() || !user.contains('@') {
        return Err(ClientError::InvalidToken);
    }
    Ok(())
}
