// Error Handling
//
// *La Gestion des Erreurs* (The Error Management) - One taxonomy for every failure
// the inference client can report.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelaisError>;

/// What went wrong while reaching the inference service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityCause {
    /// Connection refused or host unreachable
    Refused,

    /// The request did not complete within its timeout
    TimedOut,

    /// The HTTP layer failed (bad status, broken body, protocol error)
    Http,

    /// A circuit breaker rejected the call without attempting it
    CircuitOpen,

    /// Anything the classifier did not recognise
    Unexpected,
}

/// Relay error types
#[derive(Debug, Error)]
pub enum RelaisError {
    /// Service unreachable, timed out, or breaker-open
    #[error("Connectivity error: {message}")]
    Connectivity {
        message: String,
        cause: ConnectivityCause,
    },

    /// Empty or unparseable response stream
    #[error("Invalid response: {message}")]
    ResponseValidity { message: String },

    /// The service answered with an application-level error
    #[error("Inference service error: {message}")]
    Operation { message: String },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Caller-supplied input rejected before any request is made
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// I/O errors with context
    #[error("I/O error: {context}")]
    Io {
        context: String,
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}

impl RelaisError {
    /// Create a connectivity error with an explicit cause
    pub fn connectivity(message: impl Into<String>, cause: ConnectivityCause) -> Self {
        RelaisError::Connectivity {
            message: message.into(),
            cause,
        }
    }

    /// Create a response validity error
    pub fn response_validity(message: impl Into<String>) -> Self {
        RelaisError::ResponseValidity {
            message: message.into(),
        }
    }

    /// Create an operation error
    pub fn operation(message: impl Into<String>) -> Self {
        RelaisError::Operation {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config_error(message: impl Into<String>, suggestion: Option<String>) -> Self {
        RelaisError::Configuration {
            message: message.into(),
            suggestion,
        }
    }

    /// Create a validation error
    pub fn validation_error(message: impl Into<String>) -> Self {
        RelaisError::Validation {
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the operation and path it concerned
    pub fn io(context: impl Into<String>, path: Option<PathBuf>, source: std::io::Error) -> Self {
        RelaisError::Io {
            context: context.into(),
            path,
            source,
        }
    }

    /// Connectivity cause, if this is a connectivity error
    pub fn connectivity_cause(&self) -> Option<ConnectivityCause> {
        match self {
            RelaisError::Connectivity { cause, .. } => Some(*cause),
            _ => None,
        }
    }

    /// Check if this error is a transient network-class failure
    ///
    /// Default retry predicate. Breaker-open rejections are not retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.connectivity_cause(),
            Some(ConnectivityCause::Refused | ConnectivityCause::TimedOut | ConnectivityCause::Http)
        )
    }

    /// Get user-friendly suggestion for recovery
    pub fn suggestion(&self) -> Option<String> {
        match self {
            RelaisError::Configuration { suggestion, .. } => suggestion.clone(),
            RelaisError::Connectivity {
                cause: ConnectivityCause::Refused,
                ..
            } => Some("Start the service with `ollama serve` and check host/port.".to_string()),
            RelaisError::Connectivity {
                cause: ConnectivityCause::TimedOut,
                ..
            } => Some("Increase the request timeout or try a smaller model.".to_string()),
            RelaisError::Connectivity {
                cause: ConnectivityCause::CircuitOpen,
                ..
            } => Some("Wait for the service to recover, then try again.".to_string()),
            RelaisError::Operation { .. } => {
                Some("Check that the model is pulled (`ollama pull <model>`).".to_string())
            }
            _ => None,
        }
    }
}

/// Format error for user display
///
/// # Arguments
///
/// * `error` - The error to format
///
/// # Returns
///
/// Formatted error message with suggestions
pub fn format_error(error: &RelaisError) -> String {
    let mut message = format!("Error: {}", error);

    if let Some(suggestion) = error.suggestion() {
        message.push_str(&format!("\n\nSuggestion: {}", suggestion));
    }

    if let RelaisError::Io { path: Some(p), .. } = error {
        message.push_str(&format!("\n\nPath: {}", p.display()));
    }

    message
}
