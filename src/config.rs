use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL the backend API is mounted under, without a trailing slash.
    pub api_base: String,
    /// Per-request timeout in seconds. Applies to every call, including the
    /// eight concurrent master data fetches.
    pub request_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8080/api".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let api_base = std::env::var("API_BASE")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/api".to_string());

        let request_timeout_seconds = std::env::var("REQUEST_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let config = Config {
            api_base: api_base.trim_end_matches('/').to_string(),
            request_timeout_seconds,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.is_empty() {
            return Err(ConfigError::ValidationError(
                "API_BASE cannot be empty".to_string(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "REQUEST_TIMEOUT_SECONDS must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
