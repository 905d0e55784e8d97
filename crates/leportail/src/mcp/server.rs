// MCP Server
//
// This module implements the MCP (Model Context Protocol) JSON-RPC dispatcher
// and its HTTP transport using axum.

use super::handlers::ToolHandler;
use super::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use crate::output::ArtifactKind;
use crate::review::ReviewService;
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router, Server,
};
use serde_json::{json, Value};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Server name reported by `initialize` and `/health`
pub const SERVER_NAME: &str = "dockerfile-ai";

/// MCP Server configuration
#[derive(Clone, Debug)]
pub struct McpServerConfig {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// Whether to enable CORS for all origins
    pub enable_cors: bool,

    /// Maximum request size in megabytes
    pub max_request_size_mb: usize,

    /// Deadline for one tool call, retries included
    pub request_timeout_secs: u64,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            enable_cors: true,
            max_request_size_mb: 10,
            request_timeout_secs: 300,
        }
    }
}

/// State shared by every request, on every transport
#[derive(Debug, Clone)]
pub struct McpState {
    service: Arc<ReviewService>,
    handlers: Arc<Vec<ToolHandler>>,
    request_timeout: Duration,
}

impl McpState {
    /// State serving every tool through `service`
    pub fn new(service: ReviewService, request_timeout: Duration) -> Self {
        Self {
            service: Arc::new(service),
            handlers: Arc::new(ToolHandler::all()),
            request_timeout,
        }
    }

    /// Review service behind the tools
    pub fn service(&self) -> &ReviewService {
        &self.service
    }

    /// Handle one raw JSON-RPC message
    ///
    /// Returns `None` for notifications. Unparseable input yields a parse
    /// error with a `null` id.
    pub async fn handle_message(&self, payload: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(payload) {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to parse JSON-RPC request: {}", e);
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::parse_error(e.to_string()),
                ));
            }
        };
        self.dispatch(request).await
    }

    /// Route a parsed request to its method
    pub async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        let is_notification = request.is_notification();
        debug!("Received JSON-RPC request: method={}", request.method);

        if let Err(e) = request.validate() {
            warn!("Invalid JSON-RPC request: {}", e);
            return (!is_notification).then(|| JsonRpcResponse::error(id, e));
        }

        let result = match request.method.as_str() {
            "initialize" => Ok(initialize_result()),
            "notifications/initialized" => Ok(json!({})),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(list_tools_json(&self.handlers)),
            "tools/call" => self.handle_tool_call(&request).await,
            "resources/list" => self.list_resources(),
            "resources/read" => self.read_resource(&request),
            "prompts/list" => Ok(list_prompts_json()),
            "prompts/get" => get_prompt(&request),
            _ => Err(JsonRpcError::method_not_found(request.method.clone())),
        };

        if is_notification {
            if let Err(e) = result {
                debug!("Notification {} failed: {}", request.method, e);
            }
            return None;
        }

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                warn!("Request failed: {}", e);
                JsonRpcResponse::error(id, e)
            }
        })
    }

    /// Handle tool call requests
    ///
    /// Tool failures are successful JSON-RPC responses with `isError: true`;
    /// only an unknown tool or malformed params is a JSON-RPC error.
    pub async fn handle_tool_call(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let tool_call = req.extract_tool_call()?;
        debug!("Tool call: name={}", tool_call.name);

        let handler = self
            .handlers
            .iter()
            .find(|h| h.name() == tool_call.name)
            .ok_or_else(|| JsonRpcError::method_not_found(tool_call.name.clone()))?;

        let outcome = match tokio::time::timeout(
            self.request_timeout,
            handler.execute(&self.service, tool_call.arguments),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(JsonRpcError::timed_out(self.request_timeout.as_secs())),
        };

        Ok(match outcome {
            Ok(value) => tool_result(&value, false),
            Err(e) => {
                warn!("Tool execution failed: {}", e);
                let mut payload = json!({ "status": "error", "error": e.message });
                if let Some(data) = e.data {
                    payload["details"] = data;
                }
                tool_result(&payload, true)
            }
        })
    }

    fn list_resources(&self) -> Result<Value, JsonRpcError> {
        let listing = self
            .service
            .store()
            .list()
            .map_err(|e| JsonRpcError::internal_error(format!("Failed to list resources: {}", e)))?;

        let analyses = listing
            .analyses
            .iter()
            .map(|entry| (ArtifactKind::Analysis, "Analysis", entry));
        let dockerfiles = listing
            .corrected_dockerfiles
            .iter()
            .map(|entry| (ArtifactKind::Dockerfile, "Corrected", entry));

        let resources: Vec<Value> = analyses
            .chain(dockerfiles)
            .map(|(kind, label, entry)| {
                json!({
                    "uri": kind.uri(&entry.name),
                    "name": format!("{}: {}", label, entry.name),
                    "description": format!("Saved at {}", format_mtime(entry.modified)),
                    "mimeType": kind.mime_type(),
                })
            })
            .collect();

        Ok(json!({ "resources": resources }))
    }

    fn read_resource(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let uri = req.string_param("uri")?;
        let store = self.service.store();

        let (kind, path) = store
            .resolve_resource(&uri)
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
        if !path.is_file() {
            return Err(JsonRpcError::resource_not_found(uri));
        }

        let (_, text) = store
            .read_resource(&uri)
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;

        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": kind.mime_type(),
                "text": text,
            }]
        }))
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {},
            "resources": {},
            "prompts": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// MCP content wrapper: `{content: [{type: "text", text}], isError}`
fn tool_result(payload: &Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "Error serializing result".to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error
    })
}

fn format_mtime(seconds: f64) -> String {
    chrono::DateTime::from_timestamp(seconds.trunc() as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| format!("{}", seconds))
}

/// List tools as JSON
pub fn list_tools_json(handlers: &[ToolHandler]) -> Value {
    let tools: Vec<_> = handlers
        .iter()
        .map(|handler| {
            json!({
                "name": handler.name(),
                "description": handler.description(),
                "inputSchema": handler.argument_schema()
            })
        })
        .collect();

    json!({ "tools": tools })
}

/// Prompt templates offered to clients
pub fn list_prompts_json() -> Value {
    json!({
        "prompts": [
            {
                "name": "analyze-dockerfile",
                "description": "Analyze a Dockerfile for security and best practices",
                "arguments": [
                    {
                        "name": "dockerfile_path",
                        "description": "Path to the Dockerfile to analyze",
                        "required": true
                    }
                ]
            },
            {
                "name": "review-dockerfile-changes",
                "description": "Review changes between original and corrected Dockerfile",
                "arguments": [
                    {
                        "name": "original_path",
                        "description": "Path to the original Dockerfile",
                        "required": true
                    },
                    {
                        "name": "corrected_name",
                        "description": "Name of the corrected Dockerfile file",
                        "required": true
                    }
                ]
            }
        ]
    })
}

fn prompt_argument(arguments: Option<&Value>, key: &str) -> Result<String, JsonRpcError> {
    arguments
        .and_then(|a| a.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("{} argument is required", key)))
}

fn prompt_message(description: &str, text: String) -> Value {
    json!({
        "description": description,
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": text }
        }]
    })
}

/// Render a prompt template
pub fn get_prompt(req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
    let name = req.string_param("name")?;
    let arguments = req.params.as_ref().and_then(|p| p.get("arguments"));

    match name.as_str() {
        "analyze-dockerfile" => {
            let dockerfile_path = prompt_argument(arguments, "dockerfile_path")?;
            Ok(prompt_message(
                "Analyze this Dockerfile for security and best practices",
                format!(
                    "Please analyze the Dockerfile at {} for:\n\
                     1. Security vulnerabilities and best practices\n\
                     2. Optimization opportunities (image size, build time)\n\
                     3. Docker best practices compliance\n\
                     4. Potential runtime issues\n\n\
                     Use the analyze_dockerfile tool to perform the analysis.",
                    dockerfile_path
                ),
            ))
        }
        "review-dockerfile-changes" => {
            let original_path = prompt_argument(arguments, "original_path")?;
            let corrected_name = prompt_argument(arguments, "corrected_name")?;
            Ok(prompt_message(
                "Review changes between original and corrected Dockerfile",
                format!(
                    "Please review the changes between:\n\
                     - Original: {}\n\
                     - Corrected: {}\n\n\
                     Use the get_analysis tool to retrieve the corrected Dockerfile, \
                     then compare it with the original to highlight key improvements.",
                    original_path, corrected_name
                ),
            ))
        }
        _ => Err(JsonRpcError::invalid_params(format!("Unknown prompt: {}", name))),
    }
}

/// MCP Server over HTTP
pub struct McpServer {
    /// Configuration for the server
    pub config: McpServerConfig,
    state: McpState,
}

impl McpServer {
    /// Create a new MCP server instance
    ///
    /// # Example
    ///
    /// ```ignore
    /// let service = ReviewService::from_config(&AppConfig::load(None)?)?;
    /// let server = McpServer::new(McpServerConfig::default(), service);
    /// server.run().await?;
    /// ```
    pub fn new(config: McpServerConfig, service: ReviewService) -> Self {
        let state = McpState::new(service, Duration::from_secs(config.request_timeout_secs));
        info!("MCP server initialized");
        Self { config, state }
    }

    /// Shared request state
    pub fn state(&self) -> &McpState {
        &self.state
    }

    /// Router with every route and layer installed
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/mcp", post(json_rpc_handler))
            .route("/mcp/tools/list", get(list_tools_handler))
            .route("/health", get(health_check_handler))
            .layer(DefaultBodyLimit::max(
                self.config.max_request_size_mb * 1024 * 1024,
            ))
            .layer(TraceLayer::new_for_http());

        let router = if self.config.enable_cors {
            router.layer(CorsLayer::very_permissive())
        } else {
            router
        };

        router.with_state(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.bind_address)
            .with_context(|| format!("Failed to bind {}", self.config.bind_address))?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let address = listener.local_addr().context("Listener has no local address")?;
        info!("Starting MCP server on {}", address);

        Server::from_tcp(listener)
            .context("Failed to adopt listener")?
            .serve(self.router().into_make_service())
            .await
            .context("Server error")?;

        Ok(())
    }
}

/// JSON-RPC request handler
async fn json_rpc_handler(State(state): State<McpState>, body: String) -> Response {
    match state.handle_message(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// List tools handler
async fn list_tools_handler(State(state): State<McpState>) -> Json<Value> {
    Json(list_tools_json(&state.handlers))
}

/// Health check handler
async fn health_check_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}
