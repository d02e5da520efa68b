use std::time::Duration;

use crate::retry::DEFAULT_MAX_RETRIES;
use crate::url::DEFAULT_HOST;

/// Environment variable naming the generation service host.
pub const HOST_ENV_VAR: &str = "OLLAMA_HOST";

/// Transport configuration for generate requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateApiConfig {
    /// Base URL of the generation service.
    pub host: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Optional whole-request timeout.
    pub timeout: Option<Duration>,
    /// Retries allowed before any body byte is consumed.
    pub max_retries: u32,
}

impl Default for GenerateApiConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            user_agent: None,
            timeout: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl GenerateApiConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Reads the host from `OLLAMA_HOST`, keeping the default when unset or blank.
    pub fn from_env() -> Self {
        match std::env::var(HOST_ENV_VAR) {
            Ok(host) if !host.trim().is_empty() => Self::new(host.trim()),
            _ => Self::default(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}
