//! Client for the hosted text-generation endpoint.
//!
//! [`CohereClient`] speaks the `/v1/generate` API. Services depend on the
//! [`TextGenerator`] trait instead so they can be exercised without a network.

mod client;
mod types;

pub use client::{CohereClient, COHERE_VERSION};
pub use types::{GenerateRequest, GenerateResponse, Generation, ReturnLikelihoods};

use async_trait::async_trait;

use crate::error::LlmResult;

/// Something that turns a prompt into the text of its first candidate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one generation and return the first candidate's raw text.
    async fn complete(&self, request: GenerateRequest) -> LlmResult<String>;
}
