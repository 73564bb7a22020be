//! Integration tests for MCP protocol handling
//!
//! Feeds newline-delimited JSON-RPC into the server loop and checks what it
//! writes back. No tool here reaches the model endpoint.

use serde_json::{json, Value};
use std::sync::Arc;

use student_counsellor::cohere::CohereClient;
use student_counsellor::config::{
    ChatConfig, CohereConfig, Config, DatabaseConfig, GenerationConfig, LogFormat, LoggingConfig,
    RequestConfig, StateConfig,
};
use student_counsellor::server::{AppState, McpServer};
use student_counsellor::slots::MemorySlotStore;
use student_counsellor::storage::SqliteStorage;

async fn create_test_server() -> McpServer {
    let config = Config {
        cohere: CohereConfig {
            api_key: "test-api-key".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
        },
        generation: GenerationConfig::default(),
        database: DatabaseConfig {
            path: ":memory:".into(),
            max_connections: 1,
        },
        state: StateConfig {
            dir: "unused".into(),
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        },
        request: RequestConfig::default(),
        chat: ChatConfig::default(),
    };

    let storage = SqliteStorage::new_in_memory().await.unwrap();
    let cohere = CohereClient::new(&config.cohere, config.request.clone()).unwrap();
    let state = AppState::new(
        config,
        Arc::new(storage),
        Arc::new(MemorySlotStore::new()),
        Arc::new(cohere),
    );
    McpServer::new(Arc::new(state))
}

/// Run the server over `input` until EOF and collect one JSON value per output line
async fn exchange(input: &str) -> Vec<Value> {
    let server = create_test_server().await;
    let mut output = Vec::new();

    server
        .serve(input.as_bytes(), &mut output)
        .await
        .expect("serve should end cleanly at EOF");

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("Failed to parse JSON-RPC response"))
        .collect()
}

/// Verify JSON-RPC 2.0 response structure
fn assert_valid_jsonrpc_response(response: &Value) {
    assert_eq!(response["jsonrpc"], "2.0", "Invalid JSON-RPC version");
    assert!(
        response.get("result").is_some() || response.get("error").is_some(),
        "Response must have result or error"
    );
}

fn line(value: Value) -> String {
    format!("{}\n", value)
}

#[cfg(test)]
mod initialize_tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_handshake() {
        let input = line(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            }
        })) + &line(json!({"jsonrpc": "2.0", "method": "initialized"}));

        let responses = exchange(&input).await;

        assert_eq!(responses.len(), 1, "The notification gets no reply");
        let response = &responses[0];
        assert_valid_jsonrpc_response(response);
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], false);
        assert_eq!(response["result"]["serverInfo"]["name"], "student-counsellor");
    }
}

#[cfg(test)]
mod tools_list_tests {
    use super::*;

    #[tokio::test]
    async fn test_tools_list_response_structure() {
        let responses =
            exchange(&line(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))).await;

        let response = &responses[0];
        assert_valid_jsonrpc_response(response);

        let tools = response["result"]["tools"]
            .as_array()
            .expect("tools should be array");
        assert_eq!(tools.len(), 19);

        for tool in tools {
            assert!(tool["name"].is_string());
            assert!(tool["description"].is_string());
            assert_eq!(tool["inputSchema"]["type"], "object");
        }

        let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
        for expected in ["assessment_answer", "assessment_submit", "chat_send", "auth_sign_in"] {
            assert!(names.contains(&expected), "Missing tool {}", expected);
        }
    }
}

#[cfg(test)]
mod tools_call_tests {
    use super::*;

    #[tokio::test]
    async fn test_tools_call_success_response() {
        let responses = exchange(&line(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "assessment_questions", "arguments": {}}
        })))
        .await;

        let result = &responses[0]["result"];
        assert!(result.get("isError").is_none());
        assert_eq!(result["content"][0]["type"], "text");

        let payload: Value =
            serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(payload["total"], 13);
        assert_eq!(payload["questions"][0]["id"], 1);
    }

    #[tokio::test]
    async fn test_tools_call_invalid_arguments_is_tool_error() {
        let responses = exchange(&line(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"name": "auth_sign_in", "arguments": {"email": "a@b.c"}}
        })))
        .await;

        let result = &responses[0]["result"];
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Invalid parameters for auth_sign_in"));
    }

    #[tokio::test]
    async fn test_state_carries_across_calls() {
        let input = line(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {"name": "auth_sign_up", "arguments": {
                "email": "asha@example.com",
                "password": "Str0ng!pass",
                "name": "Asha"
            }}
        })) + &line(json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "assessment_answer", "arguments": {"question_id": 1, "answer": "Asha"}}
        })) + &line(json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "tools/call",
            "params": {"name": "assessment_status"}
        }));

        let responses = exchange(&input).await;
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2]["id"], 6);

        let status: Value = serde_json::from_str(
            responses[2]["result"]["content"][0]["text"].as_str().unwrap(),
        )
        .unwrap();
        assert_eq!(status["answered"], 1);
    }
}

#[cfg(test)]
mod error_handling_tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_error_response() {
        let responses = exchange("{not json}\n").await;

        let response = &responses[0];
        assert_valid_jsonrpc_response(response);
        assert_eq!(response["error"]["code"], -32700);
        assert!(response["id"].is_null(), "Parse errors carry a null id");
    }

    #[tokio::test]
    async fn test_missing_params_error() {
        let responses =
            exchange(&line(json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call"}))).await;

        assert_eq!(responses[0]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_method_not_found_error() {
        let responses =
            exchange(&line(json!({"jsonrpc": "2.0", "id": 8, "method": "prompts/list"}))).await;

        assert_eq!(responses[0]["error"]["code"], -32601);
        assert!(responses[0]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("prompts/list"));
    }
}

#[cfg(test)]
mod jsonrpc_compliance_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_notification_is_ignored() {
        let responses = exchange(&line(json!({"jsonrpc": "2.0", "method": "notifications/progress"}))).await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let input = format!(
            "\n   \n{}",
            line(json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}))
        );
        let responses = exchange(&input).await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_string_id_support() {
        let responses =
            exchange(&line(json!({"jsonrpc": "2.0", "id": "uuid-123", "method": "ping"}))).await;
        assert_eq!(responses[0]["id"], "uuid-123");
    }
}
