use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub cohere: CohereConfig,
    pub generation: GenerationConfig,
    pub database: DatabaseConfig,
    pub state: StateConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub chat: ChatConfig,
}

/// Cohere API configuration
#[derive(Debug, Clone)]
pub struct CohereConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Sampling parameters for generate calls
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub model: String,
    pub analysis_max_tokens: u32,
    pub chat_max_tokens: u32,
    pub temperature: f64,
    pub k: u32,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Location of the local state slots
#[derive(Debug, Clone)]
pub struct StateConfig {
    pub dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
}

/// Chat throttling and prompt history configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Minimum interval between two accepted sends.
    pub rate_limit_ms: u64,
    /// Most recent transcript messages rendered into a prompt; 0 renders all of them.
    pub history_limit: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let cohere = CohereConfig {
            api_key: env::var("COHERE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| AppError::Config {
                    message: "COHERE_API_KEY is required".to_string(),
                })?,
            base_url: env::var("COHERE_BASE_URL")
                .unwrap_or_else(|_| "https://api.cohere.ai".to_string()),
        };

        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            model: env::var("COHERE_MODEL").unwrap_or(defaults.model),
            analysis_max_tokens: parse_var("ANALYSIS_MAX_TOKENS", defaults.analysis_max_tokens),
            chat_max_tokens: parse_var("CHAT_MAX_TOKENS", defaults.chat_max_tokens),
            temperature: parse_var("GENERATION_TEMPERATURE", defaults.temperature),
            k: parse_var("GENERATION_TOP_K", defaults.k),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/counsellor.db".to_string()),
            ),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5),
        };

        let state = StateConfig {
            dir: PathBuf::from(env::var("STATE_DIR").unwrap_or_else(|_| "./data/state".to_string())),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_var("REQUEST_TIMEOUT_MS", RequestConfig::default().timeout_ms),
        };

        let chat_defaults = ChatConfig::default();
        let chat = ChatConfig {
            rate_limit_ms: parse_var("CHAT_RATE_LIMIT_MS", chat_defaults.rate_limit_ms),
            history_limit: parse_var("CHAT_HISTORY_LIMIT", chat_defaults.history_limit),
        };

        Ok(Config {
            cohere,
            generation,
            database,
            state,
            logging,
            request,
            chat,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "command".to_string(),
            analysis_max_tokens: 1500,
            chat_max_tokens: 300,
            temperature: 0.7,
            k: 0,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 30000 }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: 1000,
            history_limit: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_defaults_match_endpoint_budget() {
        let config = GenerationConfig::default();
        assert_eq!(config.model, "command");
        assert_eq!(config.analysis_max_tokens, 1500);
        assert_eq!(config.chat_max_tokens, 300);
        assert_eq!(config.k, 0);
    }

    #[test]
    fn test_chat_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.rate_limit_ms, 1000);
        assert_eq!(config.history_limit, 20);
    }

    #[test]
    fn test_parse_var_falls_back_on_garbage() {
        env::set_var("STUDENT_COUNSELLOR_TEST_PARSE", "not-a-number");
        assert_eq!(parse_var("STUDENT_COUNSELLOR_TEST_PARSE", 7u32), 7);
        env::remove_var("STUDENT_COUNSELLOR_TEST_PARSE");
    }
}
