// Inference Client
//
// *Le Client* - Retry around the breaker around one streaming generate call,
// followed by stream decoding.

use crate::backoff::RetryPolicy;
use crate::breaker::{CircuitBreaker, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT};
use crate::decoder::{decode_stream, AnalysisResult};
use crate::error::{RelaisError, Result};
use crate::probe::{self, DEFAULT_PROBE_TIMEOUT};
use crate::retry::retry_async;
use crate::transport::{GenerateOptions, GenerateRequest, HttpTransport, InferenceTransport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Breaker name used for the inference service
pub const OLLAMA_BREAKER: &str = "ollama";

/// Connection and sampling settings for the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Service host
    pub host: String,

    /// Service port
    pub port: u16,

    /// Model name, possibly tagged
    pub model: String,

    /// Generate request timeout in seconds
    pub timeout: u64,

    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f64,

    /// Nucleus sampling cutoff (0.0 - 1.0)
    pub top_p: f64,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            model: "qwen2.5-coder:7b".to_string(),
            timeout: 120,
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 4000,
        }
    }
}

impl InferenceConfig {
    /// Validate value ranges
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(RelaisError::config_error(
                "ollama.host must not be empty",
                Some("Set ollama.host or OLLAMA_HOST, e.g. localhost".to_string()),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(RelaisError::config_error(
                "ollama.model must not be empty",
                Some("Set ollama.model or OLLAMA_MODEL, e.g. qwen2.5-coder:7b".to_string()),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RelaisError::config_error(
                format!("ollama.temperature must be between 0.0 and 2.0, got {}", self.temperature),
                None,
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(RelaisError::config_error(
                format!("ollama.top_p must be between 0.0 and 1.0, got {}", self.top_p),
                None,
            ));
        }
        if self.max_tokens == 0 {
            return Err(RelaisError::config_error("ollama.max_tokens must be at least 1", None));
        }
        if self.timeout == 0 {
            return Err(RelaisError::config_error("ollama.timeout must be at least 1 second", None));
        }
        Ok(())
    }

    /// `http://{host}:{port}`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Generate request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Sampling options for a generate request
    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.temperature,
            top_p: self.top_p,
            num_predict: self.max_tokens,
        }
    }
}

/// Resilient client for the inference service
///
/// Cloning is cheap and clones share the circuit breaker, so one client can
/// serve concurrent analyses against the same service.
#[derive(Clone)]
pub struct InferenceClient {
    config: InferenceConfig,
    transport: Arc<dyn InferenceTransport>,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("config", &self.config)
            .field("endpoint", &self.transport.endpoint())
            .field("breaker", &self.breaker)
            .field("policy", &self.policy)
            .finish()
    }
}

impl InferenceClient {
    /// Create a client backed by [`HttpTransport`]
    pub fn new(config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.host, config.port, config.request_timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over any transport
    pub fn with_transport(config: InferenceConfig, transport: Arc<dyn InferenceTransport>) -> Self {
        Self {
            config,
            transport,
            breaker: Arc::new(CircuitBreaker::new(
                OLLAMA_BREAKER,
                DEFAULT_FAILURE_THRESHOLD,
                DEFAULT_RECOVERY_TIMEOUT,
            )),
            policy: RetryPolicy::default(),
        }
    }

    /// Share an existing breaker
    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    /// Replace the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Breaker guarding the service
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Retry policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Analyze a prompt with the configured model
    pub async fn analyze(&self, prompt: &str) -> Result<AnalysisResult> {
        self.analyze_with_model(prompt, &self.config.model).await
    }

    /// Analyze a prompt with an explicit model
    ///
    /// Each attempt passes through the breaker; a decoded-but-invalid stream
    /// counts as a failure for the breaker but is not retried.
    pub async fn analyze_with_model(&self, prompt: &str, model: &str) -> Result<AnalysisResult> {
        if prompt.trim().is_empty() {
            return Err(RelaisError::validation_error("Prompt must not be empty"));
        }

        let request = GenerateRequest::new(model, prompt, self.config.generate_options());
        info!(
            "Sending analysis request to Ollama at {} (model {})",
            self.transport.endpoint(),
            model
        );

        let result = retry_async(&self.policy, || {
            let request = &request;
            self.breaker.call_async(move || async move {
                let body = self.transport.generate(request).await?;
                decode_stream(&body)
            })
        })
        .await?;

        debug!(
            "Analysis complete: {} fragments, {} characters",
            result.fragment_count(),
            result.as_str().len()
        );
        Ok(result)
    }

    /// Check the service answers its listing endpoint
    pub async fn validate_connection(&self) -> Result<()> {
        probe::validate_connection_with(self.transport.as_ref(), DEFAULT_PROBE_TIMEOUT).await
    }

    /// Check whether `model` is registered
    pub async fn check_model_available(&self, model: &str) -> Result<bool> {
        probe::check_model_available_with(self.transport.as_ref(), model, DEFAULT_PROBE_TIMEOUT)
            .await
    }

    /// Preflight: the service must be reachable; a missing model only warns
    ///
    /// Returns whether the configured model was found.
    pub async fn preflight(&self) -> Result<bool> {
        self.validate_connection().await?;
        let available = self.check_model_available(&self.config.model).await?;
        if !available {
            warn!(
                "Model {} may not be available; pull it with `ollama pull {}`",
                self.config.model, self.config.model
            );
        }
        Ok(available)
    }
}
