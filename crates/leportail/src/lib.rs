// leportail - Gateway
//
// *Le Portail* (The Gateway) - Command line, MCP server and artifact storage
// around the lerelais inference client.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

//! Dockerfile review front ends: the `dockerfile-ai` CLI and an MCP server
//! speaking JSON-RPC 2.0 over HTTP or stdio.

/// Command-line interface.
pub mod cli;
/// Layered configuration.
pub mod config;
/// Console and file logging.
pub mod logging;
/// MCP server.
pub mod mcp;
/// Saved analyses and corrected Dockerfiles.
pub mod output;
/// Prompt templates.
pub mod prompts;
/// Review pipeline.
pub mod review;

pub use cli::{report_error, Cli, Commands, ConfigAction};
pub use config::{AppConfig, ConfigOverrides, LoggingConfig, OutputConfig, PromptConfig};
pub use logging::init_logging;
pub use mcp::{McpServer, McpServerConfig, McpState};
pub use output::{ArtifactEntry, ArtifactKind, ArtifactListing, OutputStore};
pub use prompts::{format_prompt, DEFAULT_TEMPLATE};
pub use review::{DockerfileReview, ReviewOptions, ReviewService, SavedArtifacts};
