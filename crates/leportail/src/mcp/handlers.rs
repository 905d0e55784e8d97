// MCP Tool Handlers
//
// This module implements the handlers for each MCP tool that the server exposes.

use super::protocol::JsonRpcError;
use crate::review::{ReviewOptions, ReviewService};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

/// Enum of all tool handlers
///
/// Instead of using trait objects (which don't work well with async),
/// we use an enum to dispatch to the appropriate handler.
#[derive(Debug, Clone)]
pub enum ToolHandler {
    /// Handler for Dockerfile analysis
    AnalyzeDockerfile(AnalyzeDockerfileHandler),
    /// Handler for listing saved artifacts
    ListAnalyses(ListAnalysesHandler),
    /// Handler for reading one saved artifact
    GetAnalysis(GetAnalysisHandler),
}

impl ToolHandler {
    /// Every tool the server exposes, in listing order
    pub fn all() -> Vec<ToolHandler> {
        vec![
            ToolHandler::AnalyzeDockerfile(AnalyzeDockerfileHandler),
            ToolHandler::ListAnalyses(ListAnalysesHandler),
            ToolHandler::GetAnalysis(GetAnalysisHandler),
        ]
    }

    /// Get the tool name
    pub fn name(&self) -> &str {
        match self {
            ToolHandler::AnalyzeDockerfile(h) => h.name(),
            ToolHandler::ListAnalyses(h) => h.name(),
            ToolHandler::GetAnalysis(h) => h.name(),
        }
    }

    /// Get the tool description
    pub fn description(&self) -> &str {
        match self {
            ToolHandler::AnalyzeDockerfile(h) => h.description(),
            ToolHandler::ListAnalyses(h) => h.description(),
            ToolHandler::GetAnalysis(h) => h.description(),
        }
    }

    /// Get the tool argument schema
    pub fn argument_schema(&self) -> Value {
        match self {
            ToolHandler::AnalyzeDockerfile(h) => h.argument_schema(),
            ToolHandler::ListAnalyses(h) => h.argument_schema(),
            ToolHandler::GetAnalysis(h) => h.argument_schema(),
        }
    }

    /// Execute the tool
    pub async fn execute(&self, service: &ReviewService, args: Value) -> Result<Value, JsonRpcError> {
        match self {
            ToolHandler::AnalyzeDockerfile(h) => h.execute(service, args).await,
            ToolHandler::ListAnalyses(h) => h.execute(service, args).await,
            ToolHandler::GetAnalysis(h) => h.execute(service, args).await,
        }
    }
}

/// Helper to extract required string argument
fn extract_string(args: &Value, key: &str) -> Result<String, JsonRpcError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            JsonRpcError::invalid_params_with_suggestion(
                format!("Missing required argument: {}", key),
                format!("Add \"{}\": \"<value>\" to arguments", key),
            )
        })
}

/// Helper to extract optional string argument
fn extract_optional_string(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Helper to extract bool argument with default.
fn extract_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Handler for analyze_dockerfile
///
/// Runs the full review pipeline on one Dockerfile.
#[derive(Debug, Clone)]
pub struct AnalyzeDockerfileHandler;

impl AnalyzeDockerfileHandler {
    /// Returns the name of this tool
    pub fn name(&self) -> &str {
        "analyze_dockerfile"
    }

    /// Returns the description of this tool
    pub fn description(&self) -> &str {
        "Analyze a Dockerfile and provide AI-powered recommendations for security, best practices, and optimization. Returns detailed analysis and a corrected version of the Dockerfile."
    }

    /// Returns the JSON schema for the arguments of this tool
    pub fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "dockerfile_path": {
                    "type": "string",
                    "description": "Absolute path to the Dockerfile to analyze"
                },
                "model": {
                    "type": "string",
                    "description": "Ollama model to use for analysis (default: the configured model)"
                },
                "save_results": {
                    "type": "boolean",
                    "description": "Whether to save analysis and corrected Dockerfile to output directory",
                    "default": true
                }
            },
            "required": ["dockerfile_path"]
        })
    }

    /// Executes the tool
    pub async fn execute(&self, service: &ReviewService, args: Value) -> Result<Value, JsonRpcError> {
        let dockerfile_path = PathBuf::from(extract_string(&args, "dockerfile_path")?);
        let options = ReviewOptions {
            model: extract_optional_string(&args, "model"),
            save: extract_bool(&args, "save_results", true),
        };

        if !dockerfile_path.is_file() {
            return Err(JsonRpcError::invalid_params(format!(
                "Dockerfile not found at {}",
                dockerfile_path.display()
            )));
        }

        info!("MCP analyze_dockerfile: {}", dockerfile_path.display());
        let review = service
            .review(&dockerfile_path, &options)
            .await
            .map_err(|e| JsonRpcError::analysis_failed(&e))?;

        Ok(review.to_json())
    }
}

/// Handler for list_analyses
#[derive(Debug, Clone)]
pub struct ListAnalysesHandler;

impl ListAnalysesHandler {
    /// Returns the name of this tool
    pub fn name(&self) -> &str {
        "list_analyses"
    }

    /// Returns the description of this tool
    pub fn description(&self) -> &str {
        "List all saved Dockerfile analyses and corrected Dockerfiles from the output directory."
    }

    /// Returns the JSON schema for the arguments of this tool
    pub fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    /// Executes the tool
    pub async fn execute(&self, service: &ReviewService, _args: Value) -> Result<Value, JsonRpcError> {
        let store = service.store();
        let listing = store
            .list()
            .map_err(|e| JsonRpcError::internal_error(format!("Failed to list analyses: {}", e)))?;

        Ok(json!({
            "status": "success",
            "output_directory": store.root(),
            "analyses": listing.analyses,
            "corrected_dockerfiles": listing.corrected_dockerfiles,
        }))
    }
}

/// Handler for get_analysis
#[derive(Debug, Clone)]
pub struct GetAnalysisHandler;

impl GetAnalysisHandler {
    /// Returns the name of this tool
    pub fn name(&self) -> &str {
        "get_analysis"
    }

    /// Returns the description of this tool
    pub fn description(&self) -> &str {
        "Retrieve the content of a specific saved analysis or corrected Dockerfile."
    }

    /// Returns the JSON schema for the arguments of this tool
    pub fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_name": {
                    "type": "string",
                    "description": "Name of the analysis or Dockerfile file to retrieve"
                }
            },
            "required": ["file_name"]
        })
    }

    /// Executes the tool
    pub async fn execute(&self, service: &ReviewService, args: Value) -> Result<Value, JsonRpcError> {
        let file_name = extract_string(&args, "file_name")?;

        let path = service
            .store()
            .find(&file_name)
            .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?
            .ok_or_else(|| JsonRpcError::resource_not_found(format!("File not found: {}", file_name)))?;

        let (_, content) = service
            .store()
            .read_artifact(&file_name)
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;

        Ok(json!({
            "status": "success",
            "file_name": file_name,
            "file_path": path,
            "content": content,
        }))
    }
}
