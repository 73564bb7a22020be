//! Integration tests for SQLite storage layer
//!
//! Tests database operations against in-memory and on-disk SQLite databases.

use student_counsellor::analysis::AnalysisResult;
use student_counsellor::assessment::ResponseSet;
use student_counsellor::config::DatabaseConfig;
use student_counsellor::error::StorageError;
use student_counsellor::storage::{AssessmentAttempt, AuthSession, SqliteStorage, Storage, User};

/// Create an in-memory storage instance for testing
async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

fn sample_responses(name: &str) -> ResponseSet {
    let mut responses = ResponseSet::new();
    responses.insert(1, name);
    responses.insert(2, "1");
    responses.insert(3, "7.25");
    for id in 4..=13 {
        responses.insert(id, "b");
    }
    responses
}

fn sample_analysis() -> AnalysisResult {
    AnalysisResult {
        learning_persona: "A steady learner.".to_string(),
        strengths: vec!["Consistency".to_string()],
        areas_for_improvement: vec!["Sleep".to_string()],
        recommendations: vec!["Plan weekly reviews".to_string()],
    }
}

async fn registered_user(storage: &SqliteStorage, email: &str) -> User {
    let user = User::new(email, "Student", "pbkdf2-sha256$1$00$00");
    storage.create_user(&user).await.unwrap();
    user
}

#[cfg(test)]
mod user_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let storage = create_test_storage().await;
        let user = registered_user(&storage, "asha@example.com").await;

        let retrieved = storage.get_user(&user.id).await.unwrap();

        assert!(retrieved.is_some(), "User should exist");
        let retrieved = retrieved.unwrap();
        assert_eq!(retrieved.email, "asha@example.com");
        assert_eq!(retrieved.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn test_get_nonexistent_user() {
        let storage = create_test_storage().await;

        assert!(storage.get_user("nonexistent-id").await.unwrap().is_none());
        assert!(storage
            .get_user_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let storage = create_test_storage().await;
        registered_user(&storage, "asha@example.com").await;

        let duplicate = User::new("ASHA@example.com", "Other", "h");
        let result = storage.create_user(&duplicate).await;

        assert!(result.is_err(), "Emails are unique regardless of case");
    }
}

#[cfg(test)]
mod auth_session_tests {
    use super::*;

    #[tokio::test]
    async fn test_session_for_unknown_user_rejected() {
        let storage = create_test_storage().await;

        let session = AuthSession::new("missing-user");
        let result = storage.create_auth_session(&session).await;

        assert!(matches!(result, Err(StorageError::UserNotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_session_is_idempotent() {
        let storage = create_test_storage().await;
        let user = registered_user(&storage, "a@b.c").await;

        let session = AuthSession::new(&user.id);
        storage.create_auth_session(&session).await.unwrap();
        storage.delete_auth_session(&session.token).await.unwrap();
        storage.delete_auth_session(&session.token).await.unwrap();

        assert!(storage
            .get_auth_session(&session.token)
            .await
            .unwrap()
            .is_none());
    }
}

#[cfg(test)]
mod attempt_tests {
    use super::*;

    #[tokio::test]
    async fn test_attempt_round_trip() {
        let storage = create_test_storage().await;
        let user = registered_user(&storage, "a@b.c").await;

        let attempt = AssessmentAttempt::new(&user.id, sample_responses("Ravi"), sample_analysis());
        storage.create_attempt(&attempt).await.unwrap();

        let retrieved = storage.get_attempt(&attempt.id).await.unwrap().unwrap();
        assert_eq!(retrieved.user_id, user.id);
        assert_eq!(retrieved.student_name, "Ravi");
        assert_eq!(retrieved.responses, attempt.responses);
        assert_eq!(retrieved.analysis, attempt.analysis);
    }

    #[tokio::test]
    async fn test_attempts_are_scoped_to_owner() {
        let storage = create_test_storage().await;
        let first = registered_user(&storage, "first@b.c").await;
        let second = registered_user(&storage, "second@b.c").await;

        for name in ["One", "Two"] {
            let attempt =
                AssessmentAttempt::new(&first.id, sample_responses(name), sample_analysis());
            storage.create_attempt(&attempt).await.unwrap();
        }
        let other = AssessmentAttempt::new(&second.id, sample_responses("Three"), sample_analysis());
        storage.create_attempt(&other).await.unwrap();

        let mine = storage.list_attempts(&first.id).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].student_name, "Two", "Newest attempt comes first");
        assert_eq!(mine[1].student_name, "One");

        assert_eq!(storage.list_attempts(&second.id).await.unwrap().len(), 1);
        assert!(storage.list_attempts("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_nonexistent_attempt() {
        let storage = create_test_storage().await;
        assert!(storage.get_attempt("missing").await.unwrap().is_none());
    }
}

#[cfg(test)]
mod file_database_tests {
    use super::*;

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested").join("counsellor.db"),
            max_connections: 2,
        };

        let user_id = {
            let storage = SqliteStorage::new(&config).await.unwrap();
            let user = registered_user(&storage, "keep@b.c").await;
            let attempt =
                AssessmentAttempt::new(&user.id, sample_responses("Kept"), sample_analysis());
            storage.create_attempt(&attempt).await.unwrap();
            storage.pool().close().await;
            user.id
        };

        let storage = SqliteStorage::new(&config).await.unwrap();
        let attempts = storage.list_attempts(&user_id).await.unwrap();

        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].student_name, "Kept");
    }
}
