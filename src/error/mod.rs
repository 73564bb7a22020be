use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generation error: {0}")]
    Llm(#[from] LlmError),

    #[error("Analysis error: {0}")]
    Parse(#[from] ParseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Counsellor error: {0}")]
    Counsellor(#[from] CounsellorError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("Attempt not found: {attempt_id}")]
    AttemptNotFound { attempt_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Slot '{key}' could not be written: {message}")]
    Slot { key: String, message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors calling the hosted text-generation endpoint
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures recovering an analysis from model output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Malformed reply: {message}")]
    MalformedReply { message: String },

    #[error("Incomplete reply: field '{field}' is missing or has the wrong shape")]
    IncompleteReply { field: String },
}

/// Field-level answer validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown question: {question_id}")]
    UnknownQuestion { question_id: u32 },

    #[error("Please provide an answer")]
    Empty,

    #[error("Please enter a valid number")]
    NotANumber,

    #[error("Please enter a valid CGPA with decimal values (e.g., 3.50)")]
    MissingDecimal,

    #[error("CGPA must be between 0.00 and 10.00")]
    CgpaOutOfRange,

    #[error("Number of backlogs cannot be negative")]
    NegativeBacklogs,

    #[error("'{key}' is not an option for this question")]
    UnknownOption { key: String },
}

/// Rejected questionnaire navigation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("Question index {index} is out of range (0..{count})")]
    OutOfRange { index: usize, count: usize },

    #[error("Please answer the previous questions first")]
    Locked { index: usize },
}

/// Identity operation failures, surfaced verbatim to the caller
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("User already registered")]
    AlreadyRegistered,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Name is required")]
    MissingName,

    #[error("{}", .violations.join("; "))]
    WeakPassword { violations: Vec<String> },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("No authenticated user")]
    NotAuthenticated,

    #[error("Password hashing failed: {0}")]
    Hashing(#[from] tokio::task::JoinError),

    #[error("Auth backend error: {0}")]
    Backend(#[from] StorageError),
}

/// Chat turn failures
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("A response is already in progress")]
    Busy,

    #[error("Please wait a moment before sending another message (retry in {retry_in_ms}ms)")]
    RateLimited { retry_in_ms: u64 },

    #[error("No analysis available; submit the assessment first")]
    NoAnalysis,

    #[error("Failed to get response: {0}")]
    Generation(#[from] LlmError),
}

/// Submit-for-analysis failures
#[derive(Debug, Error)]
pub enum CounsellorError {
    #[error("Please answer all questions before submitting ({answered}/{total} answered)")]
    Incomplete { answered: usize, total: usize },

    #[error("An analysis is already in progress")]
    Busy,

    #[error("Failed to analyze responses: {0}")]
    Generation(#[from] LlmError),

    #[error("Failed to parse analysis response: {0}")]
    Analysis(#[from] ParseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for McpError {
    fn from(err: AppError) -> Self {
        McpError::ExecutionFailed {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for generation calls
pub type LlmResult<T> = Result<T, LlmError>;

/// Result type alias for identity operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
