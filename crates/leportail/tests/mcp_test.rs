// MCP server tests: JSON-RPC dispatch, stdio framing and the HTTP transport

mod common;

#[cfg(test)]
mod tests {
    use super::common::{Behavior, Fixture, CORRECTED, ORIGINAL};
    use leportail::mcp::{error_codes, serve_stdio, serve_stdio_with_limit, JsonRpcResponse};
    use leportail::{McpServer, McpServerConfig, McpState};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn state(fixture: &Fixture) -> McpState {
        McpState::new(fixture.service.clone(), Duration::from_secs(30))
    }

    async fn call(state: &McpState, message: Value) -> JsonRpcResponse {
        state
            .handle_message(&message.to_string())
            .await
            .expect("request should produce a response")
    }

    fn tool_payload(response: &JsonRpcResponse) -> (bool, Value) {
        let result = response.result.as_ref().unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        (
            result["isError"].as_bool().unwrap(),
            serde_json::from_str(text).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_initialize_and_ping() {
        let fixture = Fixture::answering();
        let state = state(&fixture);

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(response.id, json!(1));
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert!(result["capabilities"]["tools"].is_object());

        let response = call(&state, json!({"jsonrpc": "2.0", "id": "p", "method": "ping"})).await;
        assert_eq!(response.result, Some(json!({})));
        assert_eq!(response.id, json!("p"));
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let fixture = Fixture::answering();
        let state = state(&fixture);

        let message = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(state.handle_message(&message.to_string()).await.is_none());

        let message = json!({"jsonrpc": "2.0", "method": "no/such/method"});
        assert!(state.handle_message(&message.to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let fixture = Fixture::answering();
        let state = state(&fixture);

        let response = state.handle_message("{not json").await.unwrap();
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.unwrap().code, error_codes::PARSE_ERROR);

        let response = call(&state, json!({"jsonrpc": "1.0", "id": 2, "method": "ping"})).await;
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_REQUEST);

        let response = call(&state, json!({"jsonrpc": "2.0", "id": 3, "method": "bogus"})).await;
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "no_such_tool", "arguments": {}}}),
        )
        .await;
        assert_eq!(response.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_list_names_every_tool() {
        let fixture = Fixture::answering();
        let state = state(&fixture);

        let response = call(&state, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["analyze_dockerfile", "list_analyses", "get_analysis"]);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_analyze_then_list_and_get() {
        let fixture = Fixture::answering();
        let state = state(&fixture);
        let path = fixture.dockerfile(ORIGINAL);

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                   "params": {"name": "analyze_dockerfile",
                              "arguments": {"dockerfile_path": path}}}),
        )
        .await;
        let (is_error, payload) = tool_payload(&response);
        assert!(!is_error);
        assert_eq!(payload["status"], "success");
        assert_eq!(payload["model_used"], "qwen2.5-coder:7b");
        assert_eq!(payload["corrected_dockerfile"], CORRECTED);
        assert!(payload["saved_files"]["analysis"].is_string());

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "list_analyses"}}),
        )
        .await;
        let (_, listing) = tool_payload(&response);
        assert_eq!(listing["analyses"].as_array().unwrap().len(), 1);
        assert_eq!(listing["corrected_dockerfiles"].as_array().unwrap().len(), 1);

        let name = listing["corrected_dockerfiles"][0]["name"].as_str().unwrap().to_string();
        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "get_analysis", "arguments": {"file_name": name}}}),
        )
        .await;
        let (is_error, artifact) = tool_payload(&response);
        assert!(!is_error);
        assert_eq!(artifact["content"], CORRECTED);
    }

    #[tokio::test]
    async fn test_tool_failures_are_error_results() {
        let fixture = Fixture::answering();
        let state = state(&fixture);

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                   "params": {"name": "analyze_dockerfile",
                              "arguments": {"dockerfile_path": "/definitely/not/here/Dockerfile"}}}),
        )
        .await;
        assert!(response.error.is_none());
        let (is_error, payload) = tool_payload(&response);
        assert!(is_error);
        assert_eq!(payload["status"], "error");
        assert!(payload["error"].as_str().unwrap().contains("Dockerfile not found"));

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "get_analysis",
                              "arguments": {"file_name": "missing_analysis.md"}}}),
        )
        .await;
        let (is_error, _) = tool_payload(&response);
        assert!(is_error);
        assert_eq!(fixture.ollama.calls(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_model_reports_suggestion() {
        let fixture = Fixture::new(Behavior::Down);
        let state = state(&fixture);
        let path = fixture.dockerfile(ORIGINAL);

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                   "params": {"name": "analyze_dockerfile",
                              "arguments": {"dockerfile_path": path}}}),
        )
        .await;
        let (is_error, payload) = tool_payload(&response);
        assert!(is_error);
        assert_eq!(payload["details"]["kind"], "connectivity");
        assert!(payload["details"]["suggestion"].is_string());
    }

    #[tokio::test]
    async fn test_tool_call_deadline() {
        let fixture = Fixture::new(Behavior::Slow(Duration::from_secs(5), "late".to_string()));
        let state = McpState::new(fixture.service.clone(), Duration::from_millis(50));
        let path = fixture.dockerfile(ORIGINAL);

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                   "params": {"name": "analyze_dockerfile",
                              "arguments": {"dockerfile_path": path}}}),
        )
        .await;
        let (is_error, payload) = tool_payload(&response);
        assert!(is_error);
        assert!(payload["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_resources_list_and_read() {
        let fixture = Fixture::answering();
        let state = state(&fixture);
        let path = fixture.dockerfile(ORIGINAL);
        fixture
            .service
            .review(&path, &Default::default())
            .await
            .unwrap();

        let response =
            call(&state, json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"})).await;
        let resources = response.result.unwrap()["resources"].as_array().unwrap().clone();
        assert_eq!(resources.len(), 2);
        let analysis = resources
            .iter()
            .find(|r| r["mimeType"] == "text/markdown")
            .unwrap();
        let uri = analysis["uri"].as_str().unwrap();
        assert!(uri.starts_with("dockerfile-ai://analysis/"));

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 2, "method": "resources/read", "params": {"uri": uri}}),
        )
        .await;
        let contents = &response.result.unwrap()["contents"][0];
        assert_eq!(contents["uri"], uri);
        assert!(contents["text"].as_str().unwrap().contains("FROM ubuntu:22.04"));

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/read",
                   "params": {"uri": "dockerfile-ai://analysis/gone_analysis.md"}}),
        )
        .await;
        assert_eq!(response.error.unwrap().code, error_codes::RESOURCE_NOT_FOUND);

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 4, "method": "resources/read",
                   "params": {"uri": "dockerfile-ai://analysis/../secret"}}),
        )
        .await;
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_prompts_list_and_get() {
        let fixture = Fixture::answering();
        let state = state(&fixture);

        let response = call(&state, json!({"jsonrpc": "2.0", "id": 1, "method": "prompts/list"})).await;
        assert_eq!(response.result.unwrap()["prompts"].as_array().unwrap().len(), 2);

        let response = call(
            &state,
            json!({"jsonrpc": "2.0", "id": 2, "method": "prompts/get",
                   "params": {"name": "analyze-dockerfile"}}),
        )
        .await;
        assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_stdio_newline_framing() {
        let fixture = Fixture::answering();
        let state = state(&fixture);

        let reader = tokio_test::io::Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
            .read(b"\n{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n")
            .read(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n")
            .build();
        let mut output = Vec::new();

        serve_stdio(&state, tokio::io::BufReader::new(reader), &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["id"], 2);
        assert!(lines[1]["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn test_stdio_content_length_framing() {
        let fixture = Fixture::answering();
        let state = state(&fixture);

        let body = r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#;
        let message = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        let reader = tokio_test::io::Builder::new()
            .read(message.as_bytes())
            .build();
        let mut output = Vec::new();

        serve_stdio(&state, tokio::io::BufReader::new(reader), &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let (header, payload) = text.split_once("\r\n\r\n").unwrap();
        assert_eq!(header, format!("Content-Length: {}", payload.len()));
        let response: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(response["id"], 7);
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn test_stdio_oversized_frame_is_rejected_and_skipped() {
        let fixture = Fixture::answering();
        let state = state(&fixture);

        let big = format!(r#"{{"jsonrpc":"2.0","id":1,"method":"ping","params":{{"pad":"{}"}}}}"#, "x".repeat(64));
        let small = r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#;
        let input = format!(
            "Content-Length: {}\r\n\r\n{}Content-Length: {}\r\n\r\n{}",
            big.len(),
            big,
            small.len(),
            small
        );
        let reader = tokio_test::io::Builder::new().read(input.as_bytes()).build();
        let mut output = Vec::new();

        serve_stdio_with_limit(&state, tokio::io::BufReader::new(reader), &mut output, 48)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let responses: Vec<Value> = text
            .split("Content-Length: ")
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| serde_json::from_str(chunk.split_once("\r\n\r\n").unwrap().1).unwrap())
            .collect();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], error_codes::INVALID_REQUEST);
        assert!(responses[0]["error"]["message"].as_str().unwrap().contains("48 byte limit"));
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_http_transport() {
        let fixture = Fixture::answering();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let server = McpServer::new(
            McpServerConfig {
                bind_address: address,
                ..Default::default()
            },
            fixture.service.clone(),
        );
        let handle = tokio::spawn(server.serve(listener));

        let http = reqwest::Client::new();
        let base = format!("http://{}", address);

        let health: Value = http
            .get(format!("{}/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["service"], "dockerfile-ai");

        let response: Value = http
            .post(format!("{}/mcp", base))
            .json(&json!({"jsonrpc": "2.0", "id": 9, "method": "tools/list"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["id"], 9);
        assert_eq!(response["result"]["tools"].as_array().unwrap().len(), 3);

        let status = http
            .post(format!("{}/mcp", base))
            .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::ACCEPTED);

        let tools: Value = http
            .get(format!("{}/mcp/tools/list", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(tools["tools"][0]["name"], "analyze_dockerfile");

        handle.abort();
    }
}
