//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::assessment::AssessmentSession;
use crate::chat::ChatSession;
use crate::cohere::TextGenerator;
use crate::config::Config;
use crate::counsellor::{CompletedAnalysis, Counsellor};
use crate::identity::IdentityService;
use crate::slots::SlotStore;
use crate::storage::Storage;

/// Application state shared across handlers.
///
/// Replaces any process-wide store: every handler receives this context and
/// the mutable pieces sit behind their own locks, so tool calls mutate them
/// one at a time.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Persistent storage backend.
    pub storage: Arc<dyn Storage>,
    /// Durable local state slots.
    pub slots: Arc<dyn SlotStore>,
    /// Analysis service.
    pub counsellor: Counsellor,
    /// The in-progress questionnaire.
    pub assessment: Mutex<AssessmentSession>,
    /// Follow-up chat about the latest analysis.
    pub chat: Mutex<ChatSession>,
    /// General counsellor chat.
    pub general_chat: Mutex<ChatSession>,
    /// Current identity.
    pub identity: Mutex<IdentityService>,
    /// Analysis the assessment chat talks about.
    pub latest_analysis: Mutex<Option<CompletedAnalysis>>,
}

impl AppState {
    /// Create new application state, restoring the persisted slots.
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        slots: Arc<dyn SlotStore>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        tracing::info!(
            model = %config.generation.model,
            rate_limit_ms = config.chat.rate_limit_ms,
            history_limit = config.chat.history_limit,
            "AppState initializing"
        );

        let counsellor = Counsellor::new(
            Arc::clone(&storage),
            generator,
            config.generation.clone(),
        );
        let assessment = AssessmentSession::restore(Arc::clone(&slots));
        let chat = ChatSession::assessment(Arc::clone(&slots), config.chat.clone());
        let general_chat = ChatSession::general(config.chat.clone());
        let identity = IdentityService::new(Arc::clone(&storage));

        Self {
            config,
            storage,
            slots,
            counsellor,
            assessment: Mutex::new(assessment),
            chat: Mutex::new(chat),
            general_chat: Mutex::new(general_chat),
            identity: Mutex::new(identity),
            latest_analysis: Mutex::new(None),
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
