use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

/// Request body for `POST /v1/generate`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub k: u32,
    pub stop_sequences: Vec<String>,
    pub return_likelihoods: ReturnLikelihoods,
}

/// Token likelihood reporting mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReturnLikelihoods {
    None,
    Generation,
    All,
}

/// Response from `POST /v1/generate`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub generations: Vec<Generation>,
}

/// One generated candidate
#[derive(Debug, Clone, Deserialize)]
pub struct Generation {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
}

impl GenerateRequest {
    /// Create a request with the default sampling parameters
    pub fn new(prompt: impl Into<String>) -> Self {
        Self::from_config(prompt, &GenerationConfig::default(), 300)
    }

    /// Create a request using configured sampling parameters and a token budget
    pub fn from_config(prompt: impl Into<String>, config: &GenerationConfig, max_tokens: u32) -> Self {
        Self {
            model: config.model.clone(),
            prompt: prompt.into(),
            max_tokens,
            temperature: config.temperature,
            k: config.k,
            stop_sequences: Vec::new(),
            return_likelihoods: ReturnLikelihoods::None,
        }
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the token budget
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Add a stop sequence
    pub fn with_stop_sequence(mut self, stop: impl Into<String>) -> Self {
        self.stop_sequences.push(stop.into());
        self
    }
}

impl GenerateResponse {
    /// Text of the first candidate. Further candidates are ignored.
    pub fn first_text(&self) -> Option<&str> {
        self.generations.first().map(|g| g.text.as_str())
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
