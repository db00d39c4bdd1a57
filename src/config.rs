use crate::storage::{ImageStore, StorageError};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Name of the environment variable holding the Groq credential.
pub const API_KEY_VAR: &str = "GROQ_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] envy::Error),
    #[error("Missing API key: set GROQ_API_KEY")]
    MissingApiKey,
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Groq credential. Never printed in full.
#[derive(Clone, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Reads the Groq key out of a set of environment variables.
pub fn read_api_key<I>(vars: I) -> Result<ApiKey, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .find(|(name, _)| name == API_KEY_VAR)
        .map(|(_, value)| ApiKey::new(value.trim()))
        .filter(|key| !key.is_blank())
        .ok_or(ConfigError::MissingApiKey)
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub groq_api_key: ApiKey,

    #[serde(default = "default_groq_api_url")]
    pub groq_api_url: String,

    #[serde(default = "default_groq_model")]
    pub groq_model: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_image_base_dir")]
    pub image_base_dir: String,

    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_processing_timeout_minutes")]
    pub processing_timeout_minutes: u64,

    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    #[serde(default = "default_throttle_requests_per_minute")]
    pub throttle_requests_per_minute: u32,

    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_chat_history_limit")]
    pub chat_history_limit: usize,

    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        // Surface the dedicated error before envy reports a generic missing field.
        let api_key = read_api_key(vars.iter().cloned())?;

        let mut config: Config = envy::from_iter(vars)?;
        config.groq_api_key = api_key;
        config.validate()?;
        Ok(config)
    }

    pub fn image_store(&self) -> Result<ImageStore, StorageError> {
        ImageStore::parse(&self.image_base_dir)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.groq_api_key.is_blank() {
            return Err(ConfigError::MissingApiKey);
        }

        let store = self.image_store()?;
        if !store.exists() {
            return Err(ConfigError::Validation(format!(
                "Image base directory does not exist: {}",
                self.image_base_dir
            )));
        }

        if !self.groq_api_url.starts_with("http://") && !self.groq_api_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(format!(
                "Groq API URL must start with http:// or https://: {}",
                self.groq_api_url
            )));
        }

        if self.groq_model.trim().is_empty() {
            return Err(ConfigError::Validation("Groq model must not be empty".into()));
        }

        if self.max_image_bytes == 0 {
            return Err(ConfigError::Validation(
                "Max image bytes must be greater than 0".into(),
            ));
        }

        if self.queue_size == 0 || self.queue_size > 10000 {
            return Err(ConfigError::Validation(format!(
                "Queue size must be between 1 and 10000, got: {}",
                self.queue_size
            )));
        }

        if self.throttle_requests_per_minute == 0 {
            return Err(ConfigError::Validation(
                "Throttle requests per minute must be greater than 0".into(),
            ));
        }

        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::Validation(
                "Max concurrent jobs must be at least 1".into(),
            ));
        }

        if self.max_retries == 0 {
            return Err(ConfigError::Validation(
                "Max retries must be at least 1".into(),
            ));
        }

        // A limit below two would drop the user's own turn.
        if self.chat_history_limit < 2 {
            return Err(ConfigError::Validation(format!(
                "Chat history limit must be at least 2, got: {}",
                self.chat_history_limit
            )));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_minutes.saturating_mul(60))
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_secs(60) / self.throttle_requests_per_minute
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_minutes.saturating_mul(60))
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_groq_api_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_groq_model() -> String {
    "meta-llama/llama-4-scout-17b-16e-instruct".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_image_base_dir() -> String {
    ".".to_string()
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_processing_timeout_minutes() -> u64 {
    5
}

fn default_queue_size() -> usize {
    100
}

fn default_throttle_requests_per_minute() -> u32 {
    30
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_max_retries() -> u32 {
    3
}

fn default_chat_history_limit() -> usize {
    20
}

fn default_session_ttl_minutes() -> u64 {
    60
}
