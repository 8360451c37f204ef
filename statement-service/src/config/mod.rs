use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct StatementConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub extraction: ExtractionConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub local_path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    pub redis_url: String,
    /// Name of the processing queue (the redis list key).
    pub name: String,
    /// Capacity of the in-process queue backend.
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub endpoint: String,
    pub api_token: String,
    pub model: String,
    pub max_output_tokens: u32,
    /// Client-side abort for the gateway call, in seconds.
    pub timeout_secs: u64,
    /// Simulated work delay of the fallback extractor, in milliseconds.
    pub fallback_delay_ms: u64,
}

impl ExtractionConfig {
    /// A gateway call is only attempted with a credential that is neither
    /// missing nor one of the recognized placeholder values.
    pub fn has_valid_token(&self) -> bool {
        !is_placeholder_token(&self.api_token)
    }
}

pub fn is_placeholder_token(token: &str) -> bool {
    token.is_empty() || token == "your_token_here" || token.contains("placeholder")
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub worker_count: usize,
}

impl StatementConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(StatementConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("statement_db"), is_prod)?,
            },
            storage: StorageConfig {
                local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), is_prod)?,
            },
            queue: QueueConfig {
                backend: match get_env("QUEUE_BACKEND", Some("memory"), is_prod)?
                    .to_lowercase()
                    .as_str()
                {
                    "memory" => QueueBackend::Memory,
                    "redis" => QueueBackend::Redis,
                    other => {
                        return Err(AppError::ConfigError(anyhow::anyhow!(
                            "Invalid queue backend: {}",
                            other
                        )))
                    }
                },
                redis_url: get_env("QUEUE_REDIS_URL", Some("redis://localhost:6379"), is_prod)?,
                name: get_env("QUEUE_NAME", Some("statement-processing"), is_prod)?,
                capacity: get_env("QUEUE_CAPACITY", Some("256"), is_prod)?
                    .parse()
                    .unwrap_or(256),
            },
            extraction: ExtractionConfig {
                endpoint: get_env(
                    "EXTRACTION_ENDPOINT",
                    Some("https://extraction.example.com/api/v2/openai/extract"),
                    is_prod,
                )?,
                api_token: get_env("EXTRACTION_API_TOKEN", Some("your_token_here"), is_prod)?,
                model: get_env("EXTRACTION_MODEL", Some("gpt-4o"), is_prod)?,
                max_output_tokens: get_env("EXTRACTION_MAX_OUTPUT_TOKENS", Some("16384"), is_prod)?
                    .parse()
                    .unwrap_or(16384),
                timeout_secs: get_env("EXTRACTION_TIMEOUT_SECS", Some("120"), is_prod)?
                    .parse()
                    .unwrap_or(120),
                fallback_delay_ms: get_env("EXTRACTION_FALLBACK_DELAY_MS", Some("2000"), is_prod)?
                    .parse()
                    .unwrap_or(2000),
            },
            worker: WorkerConfig {
                enabled: get_env("WORKER_ENABLED", Some("true"), is_prod)?
                    .parse()
                    .unwrap_or(true),
                worker_count: get_env("WORKER_COUNT", Some("4"), is_prod)?
                    .parse()
                    .unwrap_or(4),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_tokens_are_rejected() {
        assert!(is_placeholder_token(""));
        assert!(is_placeholder_token("your_token_here"));
        assert!(is_placeholder_token("sk-placeholder-123"));
        assert!(!is_placeholder_token("sk-live-4f3a2b1c"));
    }
}
