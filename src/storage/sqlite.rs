use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{AssessmentAttempt, AuthSession, Storage, User};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create a private in-memory database (for tests)
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        // Every connection to :memory: is a separate database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_user(&self, user: &User) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(user.email.to_lowercase())
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(timestamp(&user.created_at))
        .execute(&self.pool)
        .await?;

        debug!(user_id = %user.id, "User created");
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, name, password_hash, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_user(&self, id: &str) -> StorageResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, name, password_hash, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn create_auth_session(&self, session: &AuthSession) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO auth_sessions (token, user_id, created_at)
            SELECT ?, id, ? FROM users WHERE id = ?
            "#,
        )
        .bind(&session.token)
        .bind(timestamp(&session.created_at))
        .bind(&session.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::UserNotFound {
                user_id: session.user_id.clone(),
            });
        }

        Ok(())
    }

    async fn get_auth_session(&self, token: &str) -> StorageResult<Option<AuthSession>> {
        let row: Option<AuthSessionRow> = sqlx::query_as(
            r#"
            SELECT token, user_id, created_at
            FROM auth_sessions
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn delete_auth_session(&self, token: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_attempt(&self, attempt: &AssessmentAttempt) -> StorageResult<()> {
        let responses = serde_json::to_string(&attempt.responses)?;
        let analysis = serde_json::to_string(&attempt.analysis)?;

        let result = sqlx::query(
            r#"
            INSERT INTO assessment_attempts (id, user_id, student_name, responses, analysis, created_at)
            SELECT ?, id, ?, ?, ?, ? FROM users WHERE id = ?
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.student_name)
        .bind(&responses)
        .bind(&analysis)
        .bind(timestamp(&attempt.created_at))
        .bind(&attempt.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::UserNotFound {
                user_id: attempt.user_id.clone(),
            });
        }

        debug!(attempt_id = %attempt.id, user_id = %attempt.user_id, "Attempt saved");
        Ok(())
    }

    async fn list_attempts(&self, user_id: &str) -> StorageResult<Vec<AssessmentAttempt>> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, student_name, responses, analysis, created_at
            FROM assessment_attempts
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AssessmentAttempt::try_from).collect()
    }

    async fn get_attempt(&self, id: &str) -> StorageResult<Option<AssessmentAttempt>> {
        let row: Option<AttemptRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, student_name, responses, analysis, created_at
            FROM assessment_attempts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AssessmentAttempt::try_from).transpose()
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    password_hash: String,
    created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuthSessionRow {
    token: String,
    user_id: String,
    created_at: String,
}

impl From<AuthSessionRow> for AuthSession {
    fn from(row: AuthSessionRow) -> Self {
        Self {
            token: row.token,
            user_id: row.user_id,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: String,
    user_id: String,
    student_name: String,
    responses: String,
    analysis: String,
    created_at: String,
}

impl TryFrom<AttemptRow> for AssessmentAttempt {
    type Error = StorageError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            student_name: row.student_name,
            responses: serde_json::from_str(&row.responses)?,
            analysis: serde_json::from_str(&row.analysis)?,
            created_at: parse_timestamp(&row.created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisResult;
    use crate::assessment::ResponseSet;
    use chrono::Duration;

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            learning_persona: "Focused".to_string(),
            strengths: vec!["Notes".to_string()],
            areas_for_improvement: vec![],
            recommendations: vec!["Sleep".to_string()],
        }
    }

    #[tokio::test]
    async fn test_user_lookup_is_case_insensitive() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let user = User::new("Asha@Example.com", "Asha", "hash");
        storage.create_user(&user).await.unwrap();

        let found = storage
            .get_user_by_email("asha@example.COM")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.email, "asha@example.com");
        assert_eq!(found.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_attempts_listed_newest_first() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let user = User::new("a@b.c", "A", "h");
        storage.create_user(&user).await.unwrap();

        let mut older = AssessmentAttempt::new(&user.id, ResponseSet::new(), analysis());
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = AssessmentAttempt::new(&user.id, ResponseSet::new(), analysis());

        storage.create_attempt(&older).await.unwrap();
        storage.create_attempt(&newer).await.unwrap();

        let ids: Vec<_> = storage
            .list_attempts(&user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn test_attempt_for_unknown_user_is_rejected() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let attempt = AssessmentAttempt::new("ghost", ResponseSet::new(), analysis());

        let err = storage.create_attempt(&attempt).await.unwrap_err();
        assert!(matches!(err, StorageError::UserNotFound { .. }));
    }

    #[tokio::test]
    async fn test_auth_session_lifecycle() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let user = User::new("a@b.c", "A", "h");
        storage.create_user(&user).await.unwrap();

        let session = AuthSession::new(&user.id);
        storage.create_auth_session(&session).await.unwrap();
        let found = storage
            .get_auth_session(&session.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.user_id, user.id);

        storage.delete_auth_session(&session.token).await.unwrap();
        assert!(storage
            .get_auth_session(&session.token)
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_timestamp_is_fixed_width() {
        let at = DateTime::parse_from_rfc3339("2025-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(&at), "2025-01-01T10:00:00.000000Z");
    }
}
