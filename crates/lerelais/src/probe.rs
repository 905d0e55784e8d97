//! Preflight checks against the inference service.
//!
//! Both checks hit the model-listing endpoint. Every failure, whatever its
//! origin, surfaces as [`RelaisError::Connectivity`].

use crate::error::{ConnectivityCause, RelaisError, Result};
use crate::transport::{HttpTransport, InferenceTransport};
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for preflight probes
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

fn into_connectivity(err: RelaisError, context: &str) -> RelaisError {
    match err {
        RelaisError::Connectivity { .. } => err,
        other => RelaisError::connectivity(
            format!("{}: {}", context, other),
            ConnectivityCause::Unexpected,
        ),
    }
}

/// Validate that the service at `host:port` answers its listing endpoint
pub async fn validate_connection(host: &str, port: u16, timeout: Duration) -> Result<()> {
    let transport = HttpTransport::new(host, port, timeout)
        .map_err(|e| into_connectivity(e, "Unexpected error validating Ollama connection"))?;
    validate_connection_with(&transport, timeout).await
}

/// Validate reachability through an existing transport
pub async fn validate_connection_with(
    transport: &dyn InferenceTransport,
    timeout: Duration,
) -> Result<()> {
    transport
        .list_models(timeout)
        .await
        .map_err(|e| into_connectivity(e, "Unexpected error validating Ollama connection"))?;

    debug!("Successfully connected to Ollama at {}", transport.endpoint());
    Ok(())
}

/// Check whether `model` is registered with the service at `host:port`
pub async fn check_model_available(
    model: &str,
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<bool> {
    let transport = HttpTransport::new(host, port, timeout)
        .map_err(|e| into_connectivity(e, "Error checking model availability"))?;
    check_model_available_with(&transport, model, timeout).await
}

/// Check model availability through an existing transport
///
/// Matching is substring containment, so `qwen2.5-coder` matches the
/// registered `qwen2.5-coder:7b`.
pub async fn check_model_available_with(
    transport: &dyn InferenceTransport,
    model: &str,
    timeout: Duration,
) -> Result<bool> {
    let models = transport
        .list_models(timeout)
        .await
        .map_err(|e| into_connectivity(e, "Error checking model availability"))?;

    let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    let available = model_matches(&names, model);

    if available {
        debug!("Model {} is available in Ollama", model);
    } else {
        warn!(
            "Model {} not found in Ollama. Available models: {}",
            model,
            names.join(", ")
        );
    }

    Ok(available)
}

/// Whether any registered name contains `model`
pub fn model_matches(names: &[&str], model: &str) -> bool {
    names.iter().any(|name| name.contains(model))
}
