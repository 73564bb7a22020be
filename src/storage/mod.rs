//! Storage layer for identities and assessment history.
//!
//! This module provides SQLite-based storage for registered users, their
//! sign-in sessions, and the assessment attempts saved after each successful
//! analysis.

mod sqlite;


pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::assessment::ResponseSet;
use crate::error::StorageResult;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier.
    pub id: String,
    /// Sign-in email, stored lowercased.
    pub email: String,
    /// Display name given at sign-up.
    pub name: String,
    /// Salted password digest; never serialized.
    #[serde(skip)]
    pub password_hash: String,
    /// When the user registered.
    pub created_at: DateTime<Utc>,
}

/// A sign-in session held by the current identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Opaque session token.
    pub token: String,
    /// Owning user.
    pub user_id: String,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
}

/// A saved questionnaire submission and its analysis.
///
/// Created once per successful submission and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentAttempt {
    /// Unique attempt identifier.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Name the student gave in the questionnaire.
    pub student_name: String,
    /// Responses as submitted.
    pub responses: ResponseSet,
    /// Analysis returned for the responses.
    pub analysis: AnalysisResult,
    /// When the attempt was saved.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh id.
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            name: name.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }
}

impl AuthSession {
    /// Open a session for a user with a fresh token.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }
}

impl AssessmentAttempt {
    /// Create a new attempt. The student name is taken from the responses.
    pub fn new(user_id: impl Into<String>, responses: ResponseSet, analysis: AnalysisResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            student_name: responses.student_name().unwrap_or_default().to_string(),
            responses,
            analysis,
            created_at: Utc::now(),
        }
    }
}

/// Storage trait for database operations.
#[async_trait]
pub trait Storage: Send + Sync {
    // User operations

    /// Register a new user.
    async fn create_user(&self, user: &User) -> StorageResult<()>;
    /// Get a user by email (case-insensitive).
    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>>;
    /// Get a user by ID.
    async fn get_user(&self, id: &str) -> StorageResult<Option<User>>;

    // Auth session operations

    /// Persist a new sign-in session.
    async fn create_auth_session(&self, session: &AuthSession) -> StorageResult<()>;
    /// Get a sign-in session by token.
    async fn get_auth_session(&self, token: &str) -> StorageResult<Option<AuthSession>>;
    /// Delete a sign-in session by token.
    async fn delete_auth_session(&self, token: &str) -> StorageResult<()>;

    // Attempt operations

    /// Save an assessment attempt.
    async fn create_attempt(&self, attempt: &AssessmentAttempt) -> StorageResult<()>;
    /// Get all attempts owned by a user, newest first.
    async fn list_attempts(&self, user_id: &str) -> StorageResult<Vec<AssessmentAttempt>>;
    /// Get an attempt by ID.
    async fn get_attempt(&self, id: &str) -> StorageResult<Option<AssessmentAttempt>>;
}
