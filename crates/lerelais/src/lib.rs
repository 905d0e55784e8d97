// lerelais - Resilient Inference Relay
//
// *Le Relais* (The Relay) - Retry, circuit breaking and stream decoding in front
// of a local Ollama-compatible inference service.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

//! Client core for Dockerfile analysis against a local inference service.

/// Backoff delay policy.
pub mod backoff;
/// Consecutive-failure circuit breaker.
pub mod breaker;
/// Client composing retry, breaker, transport and decoder.
pub mod client;
/// Streaming response decoder.
pub mod decoder;
/// Error taxonomy.
pub mod error;
/// Dockerfile block extraction.
pub mod extract;
/// Connection and model preflight checks.
pub mod probe;
/// Bounded retry executor.
pub mod retry;
/// Transport trait and HTTP implementation.
pub mod transport;

pub use backoff::{RetryPolicy, RetryPolicyBuilder};
pub use breaker::{BreakerSnapshot, CircuitBreaker};
pub use client::{InferenceClient, InferenceConfig};
pub use decoder::{decode_stream, AnalysisResult, StreamDecoder, StreamFragment};
pub use error::{format_error, ConnectivityCause, RelaisError, Result};
pub use extract::extract_dockerfile;
pub use probe::{check_model_available, validate_connection, DEFAULT_PROBE_TIMEOUT};
pub use retry::{retry_async, retry_async_with, retry_sync, retry_sync_with};
pub use transport::{
    GenerateOptions, GenerateRequest, HttpTransport, InferenceTransport, ModelDescriptor,
};
