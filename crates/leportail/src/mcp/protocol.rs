// MCP Wire Types
//
// JSON-RPC 2.0 envelopes and the error objects dockerfile-ai sends back.

use lerelais::RelaisError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Envelope version every message must carry
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP revision negotiated in `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Incoming message
///
/// `id` defaults to `null`; a `null` id marks a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Envelope version
    pub jsonrpc: String,
    /// Caller-chosen id echoed in the response
    #[serde(default)]
    pub id: Value,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Reject envelopes that are not JSON-RPC 2.0
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        if self.jsonrpc == JSONRPC_VERSION {
            Ok(())
        } else {
            Err(JsonRpcError::invalid_request(format!(
                "Unsupported JSON-RPC version: {}",
                self.jsonrpc
            )))
        }
    }

    /// True when no response is expected
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }

    /// `tools/call` params; absent or `null` arguments become `{}`
    pub fn extract_tool_call(&self) -> Result<ToolCallParams, JsonRpcError> {
        let params = self
            .params
            .clone()
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;

        let mut call: ToolCallParams = serde_json::from_value(params)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tool call: {}", e)))?;
        if call.arguments.is_null() {
            call.arguments = json!({});
        }
        Ok(call)
    }

    /// Required string parameter
    pub fn string_param(&self, key: &str) -> Result<String, JsonRpcError> {
        self.params
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("Missing '{}' parameter", key)))
    }
}

/// `tools/call` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Tool name
    pub name: String,
    /// Tool arguments
    #[serde(default)]
    pub arguments: Value,
}

/// Outgoing message; exactly one of `result` and `error` is set
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Envelope version
    pub jsonrpc: String,
    /// Id of the request being answered
    pub id: Value,
    /// Method result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Method failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful reply
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Failed reply
    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Error object of a failed reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    /// One of [`error_codes`]
    pub code: i32,
    /// Short description
    pub message: String,
    /// Structured details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    /// Payload was not JSON
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(error_codes::PARSE_ERROR, msg, None)
    }

    /// Payload was JSON but not a request
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, msg, None)
    }

    /// Unknown method or tool name
    pub fn method_not_found(method: String) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            "Method not found",
            Some(json!({ "method": method })),
        )
    }

    /// Missing or malformed parameters
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, msg, None)
    }

    /// Missing or malformed parameters, with a fix for the caller
    pub fn invalid_params_with_suggestion(
        msg: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::new(
            error_codes::INVALID_PARAMS,
            msg,
            Some(json!({ "suggestion": suggestion.into() })),
        )
    }

    /// Unexpected server failure
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, msg, None)
    }

    /// No saved artifact behind `uri`
    pub fn resource_not_found(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self::new(
            error_codes::RESOURCE_NOT_FOUND,
            format!("Resource not found: {}", uri),
            Some(json!({ "uri": uri })),
        )
    }

    /// Review failed; `data` carries the error kind and any recovery hint
    pub fn analysis_failed(err: &RelaisError) -> Self {
        let mut data = json!({ "kind": error_kind(err) });
        if let Some(suggestion) = err.suggestion() {
            data["suggestion"] = Value::String(suggestion);
        }
        Self::new(error_codes::ANALYSIS_FAILED, err.to_string(), Some(data))
    }

    /// Tool call ran past the server deadline
    pub fn timed_out(seconds: u64) -> Self {
        Self::new(
            error_codes::REQUEST_TIMEOUT,
            format!("Tool call timed out after {}s", seconds),
            None,
        )
    }
}

fn error_kind(err: &RelaisError) -> &'static str {
    match err {
        RelaisError::Connectivity { .. } => "connectivity",
        RelaisError::ResponseValidity { .. } => "response_validity",
        RelaisError::Operation { .. } => "operation",
        RelaisError::Configuration { .. } => "configuration",
        RelaisError::Validation { .. } => "validation",
        RelaisError::Io { .. } => "io",
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// Error codes
///
/// Negative codes from -32700 to -32600 are reserved by JSON-RPC 2.0; the
/// -32001.. range is specific to dockerfile-ai.
pub mod error_codes {
    /// Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Not a request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Unknown method or tool
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Bad parameters
    pub const INVALID_PARAMS: i32 = -32602;
    /// Server failure
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Saved artifact not found
    pub const RESOURCE_NOT_FOUND: i32 = -32001;
    /// Dockerfile review failed
    pub const ANALYSIS_FAILED: i32 = -32002;
    /// Tool call exceeded the server deadline
    pub const REQUEST_TIMEOUT: i32 = -32003;
}

#[cfg(test)]
mod tests {
    use super::*;
    use lerelais::ConnectivityCause;

    fn parse(raw: &str) -> JsonRpcRequest {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_request_versions() {
        let req = parse(r#"{"jsonrpc": "2.0", "id": 1, "method": "tools/list"}"#);
        assert!(req.validate().is_ok());
        assert!(!req.is_notification());

        let req = parse(r#"{"jsonrpc": "1.0", "id": 1, "method": "tools/list"}"#);
        assert_eq!(req.validate().unwrap_err().code, error_codes::INVALID_REQUEST);
    }

    #[test]
    fn test_absent_or_null_id_is_notification() {
        let req = parse(r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#);
        assert!(req.is_notification());
        assert!(req.params.is_none());

        let req = parse(r#"{"jsonrpc": "2.0", "id": null, "method": "ping"}"#);
        assert!(req.is_notification());
    }

    #[test]
    fn test_response_sets_exactly_one_member() {
        let ok = serde_json::to_value(JsonRpcResponse::success(json!(1), json!({}))).unwrap();
        assert!(ok.get("result").is_some());
        assert!(ok.get("error").is_none());

        let failed = serde_json::to_value(JsonRpcResponse::error(
            json!("a"),
            JsonRpcError::invalid_params("Missing 'uri' parameter"),
        ))
        .unwrap();
        assert!(failed.get("result").is_none());
        assert_eq!(failed["error"]["code"], error_codes::INVALID_PARAMS);
        assert!(failed["error"].get("data").is_none());
    }

    #[test]
    fn test_tool_call_params() {
        let req = parse(
            r#"{"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                "params": {"name": "analyze_dockerfile",
                           "arguments": {"dockerfile_path": "/tmp/Dockerfile"}}}"#,
        );
        let call = req.extract_tool_call().unwrap();
        assert_eq!(call.name, "analyze_dockerfile");
        assert_eq!(call.arguments["dockerfile_path"], "/tmp/Dockerfile");
    }

    #[test]
    fn test_tool_call_arguments_default_to_empty_object() {
        let req = parse(
            r#"{"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                "params": {"name": "list_analyses", "arguments": null}}"#,
        );
        assert_eq!(req.extract_tool_call().unwrap().arguments, json!({}));

        let req = parse(
            r#"{"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                "params": {"name": "list_analyses"}}"#,
        );
        assert_eq!(req.extract_tool_call().unwrap().arguments, json!({}));
    }

    #[test]
    fn test_tool_call_without_name_is_invalid_params() {
        let req = parse(r#"{"jsonrpc": "2.0", "id": 3, "method": "tools/call"}"#);
        assert_eq!(req.extract_tool_call().unwrap_err().code, error_codes::INVALID_PARAMS);

        let req = parse(
            r#"{"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": 7}}"#,
        );
        assert_eq!(req.extract_tool_call().unwrap_err().code, error_codes::INVALID_PARAMS);
    }

    #[test]
    fn test_analysis_failed_carries_kind_and_suggestion() {
        let err = RelaisError::connectivity("refused", ConnectivityCause::Refused);
        let rpc = JsonRpcError::analysis_failed(&err);
        assert_eq!(rpc.code, error_codes::ANALYSIS_FAILED);
        let data = rpc.data.unwrap();
        assert_eq!(data["kind"], "connectivity");
        assert!(data["suggestion"].as_str().unwrap().contains("ollama serve"));

        let rpc = JsonRpcError::analysis_failed(&RelaisError::response_validity("empty"));
        assert!(rpc.data.unwrap().get("suggestion").is_none());
    }
}
