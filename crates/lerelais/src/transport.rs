// Inference Transport
//
// *Le Transport* - Wire types and the HTTP implementation of the two calls the
// client makes: streaming generate and model listing.

use crate::error::{ConnectivityCause, RelaisError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Generate endpoint path
pub const GENERATE_PATH: &str = "/api/generate";

/// Model listing endpoint path
pub const TAGS_PATH: &str = "/api/tags";

/// Upper bound on TCP connect time, regardless of the request timeout
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sampling options sent with a generate request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling cutoff
    pub top_p: f64,
    /// Maximum tokens to generate
    pub num_predict: u32,
}

/// Body of `POST /api/generate`
///
/// Field order and names are the service's wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model name, possibly tagged (`qwen2.5-coder:7b`)
    pub model: String,
    /// Full prompt text
    pub prompt: String,
    /// Always true; the response is line-delimited JSON
    pub stream: bool,
    /// Sampling options
    pub options: GenerateOptions,
}

impl GenerateRequest {
    /// Create a streaming generate request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, options: GenerateOptions) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: true,
            options,
        }
    }
}

/// One registered model as reported by `GET /api/tags`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Registered model name
    #[serde(default)]
    pub name: String,
}

/// Body of `GET /api/tags`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelListing {
    /// Registered models
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Transport to the inference service
///
/// Implementations must apply an explicit timeout to every request.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// `host:port` (or another human-readable address) for messages
    fn endpoint(&self) -> String;

    /// Send a streaming generate request and return the raw line-delimited body
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// Fetch the registered models within `timeout`
    async fn list_models(&self, timeout: Duration) -> Result<Vec<ModelDescriptor>>;
}

/// Map a reqwest failure onto the connectivity taxonomy
pub fn classify_request_error(err: &reqwest::Error, endpoint: &str) -> RelaisError {
    if err.is_timeout() {
        RelaisError::connectivity(
            format!("Connection to Ollama at {} timed out. Error: {}", endpoint, err),
            ConnectivityCause::TimedOut,
        )
    } else if err.is_connect() {
        RelaisError::connectivity(
            format!(
                "Cannot connect to Ollama at {}. Is Ollama running? Error: {}",
                endpoint, err
            ),
            ConnectivityCause::Refused,
        )
    } else if err.is_decode() {
        RelaisError::connectivity(
            format!("Unexpected response from Ollama at {}: {}", endpoint, err),
            ConnectivityCause::Unexpected,
        )
    } else if err.is_status() || err.is_request() || err.is_body() || err.is_redirect() {
        RelaisError::connectivity(
            format!("HTTP error connecting to Ollama: {}", err),
            ConnectivityCause::Http,
        )
    } else {
        RelaisError::connectivity(
            format!("Unexpected error talking to Ollama at {}: {}", endpoint, err),
            ConnectivityCause::Unexpected,
        )
    }
}

/// reqwest-backed transport for an Ollama-compatible HTTP API
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    host: String,
    port: u16,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for `http://{host}:{port}`
    ///
    /// `request_timeout` bounds each generate call end to end.
    pub fn new(host: impl Into<String>, port: u16, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout.min(MAX_CONNECT_TIMEOUT))
            .build()
            .map_err(|e| {
                RelaisError::connectivity(
                    format!("Failed to build HTTP client: {}", e),
                    ConnectivityCause::Unexpected,
                )
            })?;

        Ok(Self {
            client,
            host: host.into(),
            port,
            request_timeout,
        })
    }

    /// Base URL of the service
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Timeout applied to generate calls
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[async_trait]
impl InferenceTransport for HttpTransport {
    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let url = format!("{}{}", self.base_url(), GENERATE_PATH);
        let endpoint = self.endpoint();
        debug!("POST {} model={}", url, request.model);

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| classify_request_error(&e, &endpoint))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(&e, &endpoint))?;

        if status.is_success() {
            return Ok(body);
        }

        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.trim().to_string());
        let message = format!("Ollama returned HTTP {}: {}", status, detail);

        if status.is_server_error() {
            Err(RelaisError::connectivity(message, ConnectivityCause::Http))
        } else {
            Err(RelaisError::operation(message))
        }
    }

    async fn list_models(&self, timeout: Duration) -> Result<Vec<ModelDescriptor>> {
        let url = format!("{}{}", self.base_url(), TAGS_PATH);
        let endpoint = self.endpoint();
        debug!("GET {}", url);

        let listing: ModelListing = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| classify_request_error(&e, &endpoint))?
            .json()
            .await
            .map_err(|e| classify_request_error(&e, &endpoint))?;

        Ok(listing.models)
    }
}
