//! Chat transcripts, turn-taking and throttling.
//!
//! A turn is split in two so the generation call can run without holding the
//! session: [`ChatSession::begin`] validates the utterance, records it and
//! returns the request to send, and [`ChatSession::finish`] records the reply
//! or the apology. While a turn is outstanding further sends are rejected.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::analysis::AnalysisResult;
use crate::assessment::ResponseSet;
use crate::cohere::{GenerateRequest, TextGenerator};
use crate::config::{ChatConfig, GenerationConfig};
use crate::error::{ChatError, LlmResult};
use crate::prompts;
use crate::slots::{SlotStore, CHAT_SLOT};

/// Opening message of the assessment chat.
pub const ASSESSMENT_GREETING: &str = "Hi! I can help you understand your assessment results better. Feel free to ask any questions about your learning style, strengths, or areas for improvement.";

/// Opening message of the general counsellor chat.
pub const GENERAL_GREETING: &str = "Hi! I'm your AI academic counselor. I can help you with questions about our assessment process, study techniques, or general academic guidance. How can I assist you today?";

/// Assistant message appended when a turn fails.
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try asking your question again.";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The student.
    User,
    /// The counsellor model.
    Assistant,
}

impl ChatRole {
    /// Upper-case label used when rendering a transcript into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "USER",
            ChatRole::Assistant => "ASSISTANT",
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ChatMessage {
    /// A user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self::now(ChatRole::User, content)
    }

    /// An assistant message stamped with the current time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::now(ChatRole::Assistant, content)
    }

    fn now(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Which conversation a session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// Follow-up questions about a completed analysis; persisted.
    Assessment,
    /// General study advice without an analysis; in memory only.
    General,
}

/// What a turn is about.
#[derive(Debug, Clone, Copy)]
pub enum ChatContext<'a> {
    /// The latest analysis, if any, and the responses it was produced from.
    Assessment {
        analysis: Option<&'a AnalysisResult>,
        responses: &'a ResponseSet,
    },
    /// No assessment context.
    General,
}

/// A chat transcript with its turn state.
pub struct ChatSession {
    kind: ChatKind,
    messages: Vec<ChatMessage>,
    busy: bool,
    last_sent: Option<Instant>,
    config: ChatConfig,
    slots: Option<Arc<dyn SlotStore>>,
}

impl ChatSession {
    /// Restore the assessment chat from its slot, or start it with the greeting.
    pub fn assessment(slots: Arc<dyn SlotStore>, config: ChatConfig) -> Self {
        let messages: Vec<ChatMessage> = slots
            .load(CHAT_SLOT)
            .filter(|messages: &Vec<ChatMessage>| !messages.is_empty())
            .unwrap_or_else(|| vec![ChatMessage::assistant(ASSESSMENT_GREETING)]);

        info!(messages = messages.len(), "Restored assessment chat");

        Self {
            kind: ChatKind::Assessment,
            messages,
            busy: false,
            last_sent: None,
            config,
            slots: Some(slots),
        }
    }

    /// Start a general counsellor chat.
    pub fn general(config: ChatConfig) -> Self {
        Self {
            kind: ChatKind::General,
            messages: vec![ChatMessage::assistant(GENERAL_GREETING)],
            busy: false,
            last_sent: None,
            config,
            slots: None,
        }
    }

    /// Which conversation this is.
    pub fn kind(&self) -> ChatKind {
        self.kind
    }

    /// The transcript, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whether a turn is outstanding.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Start a turn.
    ///
    /// On success the trimmed utterance is appended and the request for the
    /// model is returned; the session stays busy until [`finish`](Self::finish).
    /// On failure nothing is recorded.
    pub fn begin(
        &mut self,
        utterance: &str,
        context: ChatContext<'_>,
        generation: &GenerationConfig,
    ) -> Result<GenerateRequest, ChatError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if let ChatContext::Assessment { analysis: None, .. } = context {
            return Err(ChatError::NoAnalysis);
        }
        if self.busy {
            return Err(ChatError::Busy);
        }
        if let Some(wait) = self.throttle_remaining() {
            debug!(retry_in_ms = wait.as_millis() as u64, "Chat send throttled");
            return Err(ChatError::RateLimited {
                retry_in_ms: wait.as_millis() as u64,
            });
        }

        let prompt = {
            let history = self.recent_history();
            match context {
                ChatContext::Assessment {
                    analysis: Some(analysis),
                    responses,
                } => prompts::build_assessment_chat_prompt(analysis, responses, history, utterance),
                _ => prompts::build_general_chat_prompt(history, utterance),
            }
        };

        self.busy = true;
        self.last_sent = Some(Instant::now());
        self.push(ChatMessage::user(utterance));

        debug!(kind = ?self.kind, prompt_len = prompt.len(), "Chat turn started");
        Ok(GenerateRequest::from_config(
            prompt,
            generation,
            generation.chat_max_tokens,
        ))
    }

    /// Finish the outstanding turn with the model's reply.
    ///
    /// A reply is trimmed and appended as the assistant message. A failure
    /// appends the apology and is returned as [`ChatError::Generation`].
    pub fn finish(&mut self, reply: LlmResult<String>) -> Result<ChatMessage, ChatError> {
        self.busy = false;

        match reply {
            Ok(text) => {
                let message = ChatMessage::assistant(text.trim());
                self.push(message.clone());
                Ok(message)
            }
            Err(e) => {
                warn!(kind = ?self.kind, error = %e, "Chat turn failed");
                self.push(ChatMessage::assistant(APOLOGY));
                Err(ChatError::Generation(e))
            }
        }
    }

    /// Run a whole turn against a generator.
    pub async fn send(
        &mut self,
        utterance: &str,
        context: ChatContext<'_>,
        generation: &GenerationConfig,
        generator: &dyn TextGenerator,
    ) -> Result<ChatMessage, ChatError> {
        let request = self.begin(utterance, context, generation)?;
        let reply = generator.complete(request).await;
        self.finish(reply)
    }

    /// Reset the transcript to the greeting.
    pub fn clear(&mut self) {
        let greeting = match self.kind {
            ChatKind::Assessment => ASSESSMENT_GREETING,
            ChatKind::General => GENERAL_GREETING,
        };
        self.messages = vec![ChatMessage::assistant(greeting)];
        self.persist();
        info!(kind = ?self.kind, "Chat cleared");
    }

    fn recent_history(&self) -> &[ChatMessage] {
        let limit = self.config.history_limit;
        if limit == 0 || self.messages.len() <= limit {
            &self.messages
        } else {
            &self.messages[self.messages.len() - limit..]
        }
    }

    fn throttle_remaining(&self) -> Option<Duration> {
        let interval = Duration::from_millis(self.config.rate_limit_ms);
        let elapsed = self.last_sent?.elapsed();
        interval.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.persist();
    }

    fn persist(&self) {
        if let Some(slots) = &self.slots {
            if let Err(e) = slots.save(CHAT_SLOT, &self.messages) {
                warn!(error = %e, "Failed to persist chat transcript");
            }
        }
    }
}
