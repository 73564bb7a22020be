//! # Student Counsellor
//!
//! A Model Context Protocol (MCP) server that walks a student through a
//! thirteen-question learning-style assessment, asks a Cohere model for an
//! analysis of the answers, and keeps a counselling conversation going about
//! the result.
//!
//! ## Features
//!
//! - **Questionnaire**: Fixed catalog, per-question validation and navigation
//! - **Analysis**: Prompt construction and tolerant parsing of the model reply
//! - **Assessment Chat**: Follow-up questions grounded in the latest analysis
//! - **Counsellor Chat**: General study-habit conversation without an assessment
//! - **Identity**: Email/password sign-up and sign-in
//! - **History**: Saved attempts per signed-in user
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (Rust) → Cohere generate (HTTP)
//!                    ↓
//!          SQLite (users, attempts) + state slots (JSON files)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use student_counsellor::{AppState, Config, McpServer};
//! use student_counsellor::cohere::CohereClient;
//! use student_counsellor::slots::FileSlotStore;
//! use student_counsellor::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let slots = FileSlotStore::new(&config.state.dir);
//!     let cohere = CohereClient::new(&config.cohere, config.request.clone())?;
//!     let state = AppState::new(config, Arc::new(storage), Arc::new(slots), Arc::new(cohere));
//!     McpServer::new(Arc::new(state)).run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Parsing of the model's analysis reply.
pub mod analysis;
/// Questionnaire state, answer validation and navigation.
pub mod assessment;
/// The fixed question catalog.
pub mod catalog;
/// Chat transcripts and turn handling.
pub mod chat;
/// Cohere generate client and the text generator seam.
pub mod cohere;
/// Configuration management for the MCP server.
pub mod config;
/// Submit-for-analysis orchestration and attempt history.
pub mod counsellor;
/// Error types and result aliases for the application.
pub mod error;
/// Sign-up, sign-in and the current identity.
pub mod identity;
/// Prompt templates for analysis and chat.
pub mod prompts;
/// MCP server implementation and request handling.
pub mod server;
/// Durable key/value slots for local state.
pub mod slots;
/// SQLite storage layer for users and attempts.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
