// MCP (Model Context Protocol) JSON-RPC Server
//
// Exposes Dockerfile review to AI assistants over JSON-RPC 2.0, on HTTP or
// stdio. Both transports share one dispatcher and one review service.
//
// # Example
//
// ```ignore
// use leportail::mcp::{McpServer, McpServerConfig};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let config = AppConfig::load(None)?;
//     let service = ReviewService::from_config(&config)?;
//     McpServer::new(McpServerConfig::default(), service).run().await
// }
// ```

/// Tool handlers.
pub mod handlers;
/// JSON-RPC 2.0 wire types.
pub mod protocol;
/// Dispatcher and HTTP transport.
pub mod server;
/// Stdio transport.
pub mod stdio;

pub use protocol::{error_codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::{McpServer, McpServerConfig, McpState};
pub use stdio::{run_stdio, serve_stdio, serve_stdio_with_limit};

/// MCP server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
