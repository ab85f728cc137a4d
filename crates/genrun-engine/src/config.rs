//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors detected at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API key is not set")]
    MissingCredential,

    #[error("API key '{0}' looks like a placeholder; set a real key")]
    PlaceholderCredential(String),

    #[error("{field} must be an http(s) URL, got '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

/// Engine configuration.
///
/// Built once at process start and passed by reference into the runner and
/// poller constructors.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer credential for both providers.
    pub api_key: String,

    /// Generation endpoint (chat-completion style).
    pub api_url: String,

    /// Model used for image generation.
    pub model: String,

    /// Job-based video endpoint; status is queried at `{video_api_url}/{id}`.
    pub video_api_url: String,

    /// Default model for video jobs.
    pub video_model: String,

    /// Timeout for one generation call (seconds).
    pub request_timeout_secs: u64,

    /// Timeout for downloads and job endpoint requests (seconds).
    pub fetch_timeout_secs: u64,

    /// Interval between job status queries (seconds).
    pub poll_interval_secs: u64,

    /// Directory used when a caller asks for persistence with an empty path.
    /// Defaults to `<system temp>/genrun`.
    pub default_output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "google/gemini-2.5-flash-image-preview".to_string(),
            video_api_url: "http://127.0.0.1:8000/v1/videos".to_string(),
            video_model: "sora-2".to_string(),
            request_timeout_secs: 300,
            fetch_timeout_secs: 30,
            poll_interval_secs: 10,
            default_output_dir: None,
        }
    }
}

impl Config {
    /// Check the configuration once before anything else runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        if is_placeholder_key(key) {
            return Err(ConfigError::PlaceholderCredential(key.to_string()));
        }

        check_url("api_url", &self.api_url)?;
        check_url("video_api_url", &self.video_api_url)?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.video_model.trim().is_empty() {
            return Err(ConfigError::Invalid("video model must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 || self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Directory that an explicitly empty output directory resolves to.
    pub fn default_output_dir(&self) -> PathBuf {
        self.default_output_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("genrun"))
    }
}

fn is_placeholder_key(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    matches!(
        lowered.as_str(),
        "your-api-key" | "your_api_key_here" | "changeme" | "xxx" | "sk-xxx" | "api_key"
    ) || lowered.starts_with("your")
        || lowered.starts_with('<')
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        })
    }
}
