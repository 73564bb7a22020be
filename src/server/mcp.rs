//! Model Context Protocol over newline-delimited JSON-RPC 2.0.
//!
//! One request per line in, one response per line out. Notifications get no
//! reply. Tool failures are reported inside a successful `tools/call` result
//! with `isError` set; only protocol faults become JSON-RPC errors.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use super::{handle_tool_call, SharedState};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// MCP revision implemented by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// Name reported in the initialize handshake.
pub const SERVER_NAME: &str = "student-counsellor";

/// Line was not valid JSON-RPC.
pub const PARSE_ERROR: i32 = -32700;
/// Method is not served.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// `tools/call` params missing or malformed.
pub const INVALID_PARAMS: i32 = -32602;
/// Result could not be encoded.
pub const INTERNAL_ERROR: i32 = -32603;

/// Incoming JSON-RPC message. A missing `id` marks a notification.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol tag, "2.0".
    pub jsonrpc: String,
    /// Correlation id echoed in the response.
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// Outgoing JSON-RPC message; exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// Protocol tag, "2.0".
    pub jsonrpc: String,
    /// Id of the request, or null when it could not be read.
    pub id: Value,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// One of the protocol error codes.
    pub code: i32,
    /// Description of the fault.
    pub message: String,
    /// Extra detail; unused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Name and version reported to the client.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Crate version.
    pub version: String,
}

/// Capabilities advertised at initialize.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    /// Tool support.
    pub tools: ToolCapabilities,
}

/// Tool support flags.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCapabilities {
    /// The tool list is fixed, so this is always false.
    pub list_changed: bool,
}

/// Reply to `initialize`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// MCP revision.
    pub protocol_version: String,
    /// Advertised capabilities.
    pub capabilities: Capabilities,
    /// Server identity.
    pub server_info: ServerInfo,
}

/// A tool as listed by `tools/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Name used in `tools/call`.
    pub name: String,
    /// What the tool does, for the client's model.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub input_schema: Value,
}

/// Params of `tools/call`.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// Tool to run.
    pub name: String,
    /// Arguments object, if any.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// One content block of a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    /// Block type; always "text" here.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Block text.
    pub text: String,
}

/// Reply to `tools/call`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content blocks.
    pub content: Vec<ToolResultContent>,
    /// Set when the tool failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolCallResult {
    fn text(text: String, is_error: Option<bool>) -> Self {
        Self {
            content: vec![ToolResultContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error,
        }
    }

    /// A successful result carrying `payload` as pretty-printed JSON.
    pub fn success(payload: &Value) -> Self {
        let text = serde_json::to_string_pretty(payload).unwrap_or_else(|e| {
            error!(error = %e, "Tool payload could not be encoded");
            payload.to_string()
        });
        Self::text(text, None)
    }

    /// A failed result carrying the error message.
    pub fn failure(message: impl std::fmt::Display) -> Self {
        Self::text(format!("Error: {}", message), Some(true))
    }
}

impl JsonRpcResponse {
    /// Response carrying a result.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Response carrying an error.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Encode `result` as the payload, or report an internal error.
    fn encoded<T: Serialize>(id: Option<Value>, result: T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self::success(id, value),
            Err(e) => {
                error!(error = %e, "Result could not be encoded");
                Self::error(id, INTERNAL_ERROR, format!("Internal error: {}", e))
            }
        }
    }
}

/// The MCP endpoint over a shared [`AppState`](super::AppState).
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    /// Create a server over shared state.
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve stdin/stdout until stdin closes.
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Student counsellor MCP server starting...");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve newline-delimited JSON-RPC from `reader`, writing responses to `writer`.
    ///
    /// Blank lines are skipped. Returns at end of input.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                break;
            }
            let message = line.trim();
            if message.is_empty() {
                continue;
            }
            debug!(request = %message, "Received message");

            let reply = match serde_json::from_str::<JsonRpcRequest>(message) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    warn!(error = %e, "Unreadable message");
                    Some(JsonRpcResponse::error(
                        None,
                        PARSE_ERROR,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            let Some(reply) = reply else {
                continue;
            };
            let mut encoded = serde_json::to_vec(&reply)?;
            encoded.push(b'\n');
            writer.write_all(&encoded).await?;
            writer.flush().await?;
        }

        info!("Input closed, shutting down");
        Ok(())
    }

    /// Dispatch one message. Returns `None` when no reply is due.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        match method.as_str() {
            "initialize" => Some(self.handle_initialize(id)),
            "tools/list" => Some(JsonRpcResponse::success(id, json!({ "tools": all_tools() }))),
            "tools/call" => Some(self.handle_tool_call(id, params).await),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            "initialized" | "notifications/cancelled" => {
                debug!(method = %method, "Notification received");
                None
            }
            _ if id.is_none() => {
                debug!(method = %method, "Ignoring unknown notification");
                None
            }
            _ => {
                warn!(method = %method, "Unknown method");
                Some(JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", method),
                ))
            }
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Client initializing");

        JsonRpcResponse::encoded(
            id,
            InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: Capabilities {
                    tools: ToolCapabilities {
                        list_changed: false,
                    },
                },
                server_info: ServerInfo {
                    name: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            },
        )
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params");
        };
        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e))
            }
        };

        let result = match handle_tool_call(&self.state, &params.name, params.arguments).await {
            Ok(payload) => ToolCallResult::success(&payload),
            Err(e) => {
                info!(tool = %params.name, error = %e, "Tool call failed");
                ToolCallResult::failure(e)
            }
        };

        JsonRpcResponse::encoded(id, result)
    }
}

/// Every tool the server exposes, in listing order.
pub fn all_tools() -> Vec<Tool> {
    vec![
        // Questionnaire
        get_questions_tool(),
        get_start_tool(),
        get_status_tool(),
        get_answer_tool(),
        get_next_tool(),
        get_previous_tool(),
        get_jump_tool(),
        get_reset_tool(),
        get_submit_tool(),
        // History
        get_attempts_list_tool(),
        get_attempts_get_tool(),
        // Chat
        get_chat_send_tool(),
        get_chat_history_tool(),
        get_chat_clear_tool(),
        get_counsellor_chat_tool(),
        // Identity
        get_sign_up_tool(),
        get_sign_in_tool(),
        get_sign_out_tool(),
        get_session_tool(),
    ]
}

fn no_arguments_tool(name: &str, description: &str) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

fn get_questions_tool() -> Tool {
    no_arguments_tool(
        "assessment_questions",
        "List the questionnaire: 13 questions with their kind (free-text, numeric, single-choice) and, for single-choice questions, the option keys a-d with labels.",
    )
}

fn get_start_tool() -> Tool {
    no_arguments_tool(
        "assessment_start",
        "Begin the questionnaire. Discards any saved responses and returns progress at the first question.",
    )
}

fn get_status_tool() -> Tool {
    no_arguments_tool(
        "assessment_status",
        "Current questionnaire progress: active question, recorded responses, answered count, percentage and the last field error.",
    )
}

fn get_answer_tool() -> Tool {
    Tool {
        name: "assessment_answer".to_string(),
        description: "Record an answer. Numeric answers are sent as text; CGPA must include decimals and lie between 0.00 and 10.00, backlogs cannot be negative. Single-choice answers are option keys (a-d). Replaces any earlier answer to the same question.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "question_id": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 13,
                    "description": "Catalog question id"
                },
                "answer": {
                    "type": "string",
                    "description": "Free text, a number as text, or an option key"
                }
            },
            "required": ["question_id", "answer"],
            "additionalProperties": false
        }),
    }
}

fn get_next_tool() -> Tool {
    no_arguments_tool(
        "assessment_next",
        "Move to the next question. Does nothing until the active question is answered, and on the last question.",
    )
}

fn get_previous_tool() -> Tool {
    no_arguments_tool(
        "assessment_previous",
        "Move to the previous question. Does nothing on the first question.",
    )
}

fn get_jump_tool() -> Tool {
    Tool {
        name: "assessment_jump".to_string(),
        description: "Jump to a question by zero-based index. Allowed for the first question, any answered question, or the question right after an answered one.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "index": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 12,
                    "description": "Zero-based question index"
                }
            },
            "required": ["index"],
            "additionalProperties": false
        }),
    }
}

fn get_reset_tool() -> Tool {
    no_arguments_tool(
        "assessment_reset",
        "Clear every response and return to the first question.",
    )
}

fn get_submit_tool() -> Tool {
    no_arguments_tool(
        "assessment_submit",
        "Submit a complete questionnaire for analysis. Returns the learning persona, strengths, areas for improvement and recommendations, and saves the attempt when signed in.",
    )
}

fn get_attempts_list_tool() -> Tool {
    no_arguments_tool(
        "attempts_list",
        "List the signed-in student's saved attempts, newest first.",
    )
}

fn get_attempts_get_tool() -> Tool {
    Tool {
        name: "attempts_get".to_string(),
        description: "Load one of the signed-in student's saved attempts, optionally making it the subject of the assessment chat.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "attempt_id": {
                    "type": "string",
                    "description": "Attempt id from attempts_list"
                },
                "use_for_chat": {
                    "type": "boolean",
                    "description": "Use this attempt as the assessment chat context (default: false)"
                }
            },
            "required": ["attempt_id"],
            "additionalProperties": false
        }),
    }
}

fn chat_tool(name: &str, description: &str) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The student's message"
                }
            },
            "required": ["message"],
            "additionalProperties": false
        }),
    }
}

fn get_chat_send_tool() -> Tool {
    chat_tool(
        "chat_send",
        "Ask a follow-up question about the latest analysis. Requires a submitted assessment; sends are limited to one per second.",
    )
}

fn get_chat_history_tool() -> Tool {
    no_arguments_tool(
        "chat_history",
        "The assessment chat transcript, oldest first.",
    )
}

fn get_chat_clear_tool() -> Tool {
    no_arguments_tool(
        "chat_clear",
        "Reset the assessment chat to its greeting.",
    )
}

fn get_counsellor_chat_tool() -> Tool {
    chat_tool(
        "counsellor_chat",
        "General academic counselling chat: study techniques, time management, motivation and focus. Does not need an assessment.",
    )
}

fn get_sign_up_tool() -> Tool {
    Tool {
        name: "auth_sign_up".to_string(),
        description: "Register and sign in. Passwords need at least 8 characters with an uppercase letter, a lowercase letter, a number and a special character.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "email": { "type": "string", "description": "Sign-in email" },
                "password": { "type": "string", "description": "Password" },
                "confirm_password": {
                    "type": "string",
                    "description": "Must repeat the password when given"
                },
                "name": { "type": "string", "description": "Display name" }
            },
            "required": ["email", "password", "name"],
            "additionalProperties": false
        }),
    }
}

fn get_sign_in_tool() -> Tool {
    Tool {
        name: "auth_sign_in".to_string(),
        description: "Sign in with email and password.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "email": { "type": "string", "description": "Sign-in email" },
                "password": { "type": "string", "description": "Password" }
            },
            "required": ["email", "password"],
            "additionalProperties": false
        }),
    }
}

fn get_sign_out_tool() -> Tool {
    no_arguments_tool("auth_sign_out", "Sign out the current student.")
}

fn get_session_tool() -> Tool {
    no_arguments_tool(
        "auth_session",
        "Report whether a student is signed in and who.",
    )
}
