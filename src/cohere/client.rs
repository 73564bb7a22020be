use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::types::{GenerateRequest, GenerateResponse};
use super::TextGenerator;
use crate::config::{CohereConfig, RequestConfig};
use crate::error::{LlmError, LlmResult};

/// API version pinned in every request
pub const COHERE_VERSION: &str = "2022-12-06";

/// Client for the Cohere generate endpoint
#[derive(Clone)]
pub struct CohereClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl CohereClient {
    /// Create a new Cohere client
    pub fn new(config: &CohereConfig, request_config: RequestConfig) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Run one generate call. Failures are returned as-is; nothing is retried.
    pub async fn generate(&self, request: GenerateRequest) -> LlmResult<GenerateResponse> {
        let url = format!("{}/v1/generate", self.base_url);
        let start = Instant::now();

        match self.execute_request(&url, &request).await {
            Ok(response) => {
                info!(
                    model = %request.model,
                    candidates = response.generations.len(),
                    latency_ms = start.elapsed().as_millis(),
                    "Generate call succeeded"
                );
                Ok(response)
            }
            Err(e) => {
                error!(
                    model = %request.model,
                    error = %e,
                    latency_ms = start.elapsed().as_millis(),
                    "Generate call failed"
                );
                Err(e)
            }
        }
    }

    async fn execute_request(
        &self,
        url: &str,
        request: &GenerateRequest,
    ) -> LlmResult<GenerateResponse> {
        debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            max_tokens = request.max_tokens,
            "Calling generate endpoint"
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Cohere-Version", COHERE_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    LlmError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse {
                message: format!("Failed to parse generate response: {}", e),
            })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TextGenerator for CohereClient {
    async fn complete(&self, request: GenerateRequest) -> LlmResult<String> {
        let response = self.generate(request).await?;
        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "Response contained no generations".to_string(),
            })
    }
}
