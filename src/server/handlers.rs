use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::SharedState;
use crate::assessment::{Progress, ResponseSet};
use crate::catalog;
use crate::chat::{ChatContext, ChatMessage};
use crate::counsellor::CompletedAnalysis;
use crate::error::{AppError, McpError, McpResult};
use crate::identity;
use crate::storage::User;

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    if requires_sign_in(tool_name) {
        require_user(state).await?;
    }

    match tool_name {
        // Questionnaire
        "assessment_questions" => handle_questions(),
        "assessment_start" => handle_start(state).await,
        "assessment_status" => handle_status(state).await,
        "assessment_answer" => handle_answer(state, arguments).await,
        "assessment_next" => handle_next(state).await,
        "assessment_previous" => handle_previous(state).await,
        "assessment_jump" => handle_jump(state, arguments).await,
        "assessment_reset" => handle_reset(state).await,
        "assessment_submit" => handle_submit(state).await,
        // History
        "attempts_list" => handle_attempts_list(state).await,
        "attempts_get" => handle_attempts_get(state, arguments).await,
        // Chat
        "chat_send" => handle_chat_send(state, arguments).await,
        "chat_history" => handle_chat_history(state).await,
        "chat_clear" => handle_chat_clear(state).await,
        "counsellor_chat" => handle_counsellor_chat(state, arguments).await,
        // Identity
        "auth_sign_up" => handle_sign_up(state, arguments).await,
        "auth_sign_in" => handle_sign_in(state, arguments).await,
        "auth_sign_out" => handle_sign_out(state).await,
        "auth_session" => handle_session(state).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

// ============================================================================
// Questionnaire handlers
// ============================================================================

/// Parameters for assessment_answer
#[derive(Debug, Deserialize)]
pub struct AnswerParams {
    /// Catalog question id.
    pub question_id: u32,
    /// Free text, a number as text, or an option key.
    pub answer: String,
}

/// Parameters for assessment_jump
#[derive(Debug, Deserialize)]
pub struct JumpParams {
    /// Zero-based catalog index.
    pub index: usize,
}

/// Response for navigation tools
#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    /// Whether the active question changed.
    pub moved: bool,
    /// State after the call.
    pub progress: Progress,
}

fn handle_questions() -> McpResult<Value> {
    to_value(json!({
        "total": catalog::question_count(),
        "questions": catalog::questions(),
    }))
}

/// Entering the questionnaire always starts from a clean slate
async fn handle_start(state: &SharedState) -> McpResult<Value> {
    let mut assessment = state.assessment.lock().await;
    assessment.reset();
    to_value(assessment.snapshot())
}

async fn handle_status(state: &SharedState) -> McpResult<Value> {
    to_value(state.assessment.lock().await.snapshot())
}

async fn handle_answer(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: AnswerParams = parse_arguments("assessment_answer", arguments)?;
    let mut assessment = state.assessment.lock().await;

    assessment
        .answer(params.question_id, params.answer)
        .map_err(tool_error)?;
    to_value(assessment.snapshot())
}

async fn handle_next(state: &SharedState) -> McpResult<Value> {
    let mut assessment = state.assessment.lock().await;
    let moved = assessment.advance();
    to_value(NavigationResponse {
        moved,
        progress: assessment.snapshot(),
    })
}

async fn handle_previous(state: &SharedState) -> McpResult<Value> {
    let mut assessment = state.assessment.lock().await;
    let moved = assessment.retreat();
    to_value(NavigationResponse {
        moved,
        progress: assessment.snapshot(),
    })
}

async fn handle_jump(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: JumpParams = parse_arguments("assessment_jump", arguments)?;
    let mut assessment = state.assessment.lock().await;

    assessment.jump_to(params.index).map_err(tool_error)?;
    to_value(NavigationResponse {
        moved: true,
        progress: assessment.snapshot(),
    })
}

async fn handle_reset(state: &SharedState) -> McpResult<Value> {
    let mut assessment = state.assessment.lock().await;
    assessment.reset();
    to_value(assessment.snapshot())
}

async fn handle_submit(state: &SharedState) -> McpResult<Value> {
    // Locks are released before the generate call
    let responses = state.assessment.lock().await.responses().clone();
    let owner = require_user(state).await?;

    let outcome = state
        .counsellor
        .submit(&responses, &owner)
        .await
        .map_err(tool_error)?;

    *state.latest_analysis.lock().await = Some(CompletedAnalysis {
        responses,
        analysis: outcome.analysis.clone(),
    });

    to_value(outcome)
}

// ============================================================================
// History handlers
// ============================================================================

/// Parameters for attempts_get
#[derive(Debug, Deserialize)]
pub struct AttemptParams {
    /// Attempt to load.
    pub attempt_id: String,
    /// Make the attempt the context of the assessment chat.
    #[serde(default)]
    pub use_for_chat: bool,
}

async fn handle_attempts_list(state: &SharedState) -> McpResult<Value> {
    let owner = require_user(state).await?;
    let attempts = state
        .counsellor
        .list_attempts(&owner)
        .await
        .map_err(tool_error)?;

    to_value(json!({
        "count": attempts.len(),
        "attempts": attempts,
    }))
}

async fn handle_attempts_get(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: AttemptParams = parse_arguments("attempts_get", arguments)?;
    let owner = require_user(state).await?;

    let attempt = state
        .counsellor
        .get_attempt(&owner, &params.attempt_id)
        .await
        .map_err(tool_error)?;

    if params.use_for_chat {
        debug!(attempt_id = %attempt.id, "Attempt selected as chat context");
        *state.latest_analysis.lock().await = Some(CompletedAnalysis::from(attempt.clone()));
    }

    to_value(attempt)
}

// ============================================================================
// Chat handlers
// ============================================================================

/// Parameters for chat_send and counsellor_chat
#[derive(Debug, Deserialize)]
pub struct ChatParams {
    /// The student's message.
    pub message: String,
}

/// Response for a chat turn
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The assistant's reply.
    pub reply: ChatMessage,
    /// Transcript length after the turn.
    pub message_count: usize,
}

async fn handle_chat_send(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: ChatParams = parse_arguments("chat_send", arguments)?;
    let latest = state.latest_analysis.lock().await.clone();
    let generation = state.counsellor.generation();
    let no_responses = ResponseSet::new();

    let request = {
        let mut chat = state.chat.lock().await;
        let context = ChatContext::Assessment {
            analysis: latest.as_ref().map(|l| &l.analysis),
            responses: latest.as_ref().map_or(&no_responses, |l| &l.responses),
        };
        chat.begin(&params.message, context, generation)
            .map_err(tool_error)?
    };

    // The chat lock is not held while waiting so overlapping sends see Busy
    let reply = state.counsellor.generator().complete(request).await;

    let mut chat = state.chat.lock().await;
    let reply = chat.finish(reply).map_err(tool_error)?;
    to_value(ChatResponse {
        reply,
        message_count: chat.messages().len(),
    })
}

async fn handle_chat_history(state: &SharedState) -> McpResult<Value> {
    let chat = state.chat.lock().await;
    to_value(json!({ "messages": chat.messages() }))
}

async fn handle_chat_clear(state: &SharedState) -> McpResult<Value> {
    let mut chat = state.chat.lock().await;
    chat.clear();
    to_value(json!({ "messages": chat.messages() }))
}

async fn handle_counsellor_chat(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: ChatParams = parse_arguments("counsellor_chat", arguments)?;
    let generation = state.counsellor.generation();

    let request = state
        .general_chat
        .lock()
        .await
        .begin(&params.message, ChatContext::General, generation)
        .map_err(tool_error)?;

    let reply = state.counsellor.generator().complete(request).await;

    let mut chat = state.general_chat.lock().await;
    let reply = chat.finish(reply).map_err(tool_error)?;
    to_value(ChatResponse {
        reply,
        message_count: chat.messages().len(),
    })
}

// ============================================================================
// Identity handlers
// ============================================================================

/// Parameters for auth_sign_up
#[derive(Debug, Deserialize)]
pub struct SignUpParams {
    /// Sign-in email.
    pub email: String,
    /// Password; must satisfy the password policy.
    pub password: String,
    /// Must repeat the password when given.
    #[serde(default)]
    pub confirm_password: Option<String>,
    /// Display name.
    pub name: String,
}

/// Parameters for auth_sign_in
#[derive(Debug, Deserialize)]
pub struct SignInParams {
    /// Sign-in email.
    pub email: String,
    /// Password.
    pub password: String,
}

/// Response for identity tools
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Whether someone is signed in.
    pub authenticated: bool,
    /// The signed-in user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl SessionResponse {
    fn from_user(user: Option<User>) -> Self {
        Self {
            authenticated: user.is_some(),
            user,
        }
    }
}

async fn handle_sign_up(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: SignUpParams = parse_arguments("auth_sign_up", arguments)?;

    if let Some(confirmation) = &params.confirm_password {
        identity::confirm_password(&params.password, confirmation).map_err(tool_error)?;
    }

    let user = state
        .identity
        .lock()
        .await
        .sign_up(&params.email, &params.password, &params.name)
        .await
        .map_err(tool_error)?;

    to_value(SessionResponse::from_user(Some(user)))
}

async fn handle_sign_in(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: SignInParams = parse_arguments("auth_sign_in", arguments)?;

    let user = state
        .identity
        .lock()
        .await
        .sign_in(&params.email, &params.password)
        .await
        .map_err(tool_error)?;

    to_value(SessionResponse::from_user(Some(user)))
}

async fn handle_sign_out(state: &SharedState) -> McpResult<Value> {
    state
        .identity
        .lock()
        .await
        .sign_out()
        .await
        .map_err(tool_error)?;

    to_value(SessionResponse::from_user(None))
}

async fn handle_session(state: &SharedState) -> McpResult<Value> {
    to_value(SessionResponse::from_user(current_user(state).await))
}

// ============================================================================
// Helper functions
// ============================================================================

/// The questionnaire and both chats are only open to a signed-in identity
fn requires_sign_in(tool_name: &str) -> bool {
    match tool_name {
        "assessment_questions" => false,
        name => {
            name.starts_with("assessment_")
                || name.starts_with("chat_")
                || name == "counsellor_chat"
        }
    }
}

async fn current_user(state: &SharedState) -> Option<User> {
    state.identity.lock().await.current().cloned()
}

async fn require_user(state: &SharedState) -> McpResult<User> {
    state
        .identity
        .lock()
        .await
        .require()
        .cloned()
        .map_err(tool_error)
}

/// Convert a domain error into a tool failure carrying its message
fn tool_error(err: impl Into<AppError>) -> McpError {
    McpError::from(err.into())
}

fn to_value<T: Serialize>(value: T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(McpError::Json)
}

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}
