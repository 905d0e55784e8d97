//! MCP over stdio
//!
//! Accepts newline-delimited JSON-RPC messages and `Content-Length` framed
//! messages on the same stream. Once a client sends a framed message, every
//! later response is framed too.

use super::protocol::{JsonRpcError, JsonRpcResponse};
use super::server::{McpServerConfig, McpState};
use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

/// Serve JSON-RPC over a reader/writer pair until the reader hits EOF
///
/// Framed messages are capped at the HTTP body limit.
pub async fn serve_stdio<R, W>(state: &McpState, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let limit = McpServerConfig::default().max_request_size_mb * 1024 * 1024;
    serve_stdio_with_limit(state, reader, writer, limit).await
}

/// [`serve_stdio`] with an explicit cap on `Content-Length` payloads
pub async fn serve_stdio_with_limit<R, W>(
    state: &McpState,
    mut reader: R,
    mut writer: W,
    max_message_bytes: usize,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("MCP stdio server reading JSON-RPC from stdin");
    let mut use_content_length = false;

    loop {
        let mut line = String::new();
        let bytes = reader
            .read_line(&mut line)
            .await
            .context("Failed to read stdin")?;
        if bytes == 0 {
            break;
        }

        let line_trim = line.trim_end();
        if line_trim.is_empty() {
            continue;
        }

        let payload = match content_length(line_trim) {
            Some(Ok(length)) => {
                use_content_length = true;

                // Remaining headers end at a blank line
                loop {
                    let mut header = String::new();
                    let n = reader.read_line(&mut header).await.unwrap_or(0);
                    if n == 0 || header.trim().is_empty() {
                        break;
                    }
                }

                if length > max_message_bytes {
                    warn!(
                        "Discarding {} byte message, limit is {} bytes",
                        length, max_message_bytes
                    );
                    tokio::io::copy(&mut (&mut reader).take(length as u64), &mut tokio::io::sink())
                        .await
                        .context("Failed to discard oversized message")?;
                    let response = JsonRpcResponse::error(
                        serde_json::Value::Null,
                        JsonRpcError::invalid_request(format!(
                            "Message of {} bytes exceeds the {} byte limit",
                            length, max_message_bytes
                        )),
                    );
                    write_response(&mut writer, &response, use_content_length).await?;
                    continue;
                }

                let mut buf = vec![0u8; length];
                if let Err(e) = reader.read_exact(&mut buf).await {
                    error!("Failed to read JSON payload: {}", e);
                    break;
                }
                String::from_utf8_lossy(&buf).into_owned()
            }
            Some(Err(e)) => {
                warn!("Invalid Content-Length header: {}", e);
                continue;
            }
            None => line_trim.to_string(),
        };

        let Some(response) = state.handle_message(&payload).await else {
            debug!("Notification handled, no response sent");
            continue;
        };

        write_response(&mut writer, &response, use_content_length).await?;
    }

    debug!("stdin closed, stopping MCP stdio server");
    Ok(())
}

/// Serve on the process's stdin and stdout
pub async fn run_stdio(state: &McpState) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_stdio(state, stdin, stdout).await
}

fn content_length(line: &str) -> Option<std::result::Result<usize, std::num::ParseIntError>> {
    let (name, value) = line.split_once(':')?;
    name.trim()
        .eq_ignore_ascii_case("content-length")
        .then(|| value.trim().parse())
}

async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse, framed: bool) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_string(response).context("Failed to serialize response")?;
    let message = if framed {
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body)
    } else {
        format!("{}\n", body)
    };

    writer
        .write_all(message.as_bytes())
        .await
        .context("Failed to write to stdout")?;
    writer.flush().await.context("Failed to flush stdout")?;
    Ok(())
}
