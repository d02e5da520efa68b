//! Environment configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const HOST_ENV_VAR: &str = "OLLAMA_HOST";
pub const MODEL_ENV_VAR: &str = "STREAM_FORMATTER_MODEL";
pub const THEME_ENV_VAR: &str = "STREAM_FORMATTER_HIGHLIGHT_THEME";
pub const RAW_HTML_ENV_VAR: &str = "STREAM_FORMATTER_RAW_HTML";
pub const TIMEOUT_ENV_VAR: &str = "STREAM_FORMATTER_TIMEOUT_SECS";
pub const PROVIDER_ENV_VAR: &str = "STREAM_FORMATTER_PROVIDER";

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_HIGHLIGHT_THEME: &str = "base16-ocean.dark";

/// Models offered by the front end, first entry is the default.
pub const MODEL_LIST: &[&str] = &[
    "deepseek-r1:32b",
    "deepseek-r1:8b",
    "deepseek-r1:1.5b",
    "llama2",
    "mistral",
    "codellama",
];

/// Which generation backend a front end should construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Http,
    Mock,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" | "ollama" => Ok(Self::Http),
            "mock" => Ok(Self::Mock),
            other => Err(format!("unknown provider '{other}' (expected http or mock)")),
        }
    }
}

/// Knobs consumed by [`crate::ResponseFormatter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterConfig {
    pub highlight_theme: String,
    /// Let raw HTML from the model through the markdown compiler unescaped.
    pub allow_raw_html: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            highlight_theme: DEFAULT_HIGHLIGHT_THEME.to_string(),
            allow_raw_html: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub host: String,
    pub model: String,
    pub formatter: FormatterConfig,
    pub timeout: Option<Duration>,
    pub provider: ProviderKind,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: MODEL_LIST[0].to_string(),
            formatter: FormatterConfig::default(),
            timeout: None,
            provider: ProviderKind::default(),
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string_opt(HOST_ENV_VAR).unwrap_or(defaults.host),
            model: env_string_opt(MODEL_ENV_VAR).unwrap_or(defaults.model),
            formatter: FormatterConfig {
                highlight_theme: env_string_opt(THEME_ENV_VAR)
                    .unwrap_or(defaults.formatter.highlight_theme),
                allow_raw_html: env_flag(RAW_HTML_ENV_VAR),
            },
            timeout: env_string_opt(TIMEOUT_ENV_VAR)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            provider: env_string_opt(PROVIDER_ENV_VAR)
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value.trim() == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
