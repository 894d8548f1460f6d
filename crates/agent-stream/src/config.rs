use std::time::Duration;

use crate::errors::StreamError;

pub const API_KEY_ENV: &str = "M8TES_API_KEY";
pub const BASE_URL_ENV: &str = "M8TES_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "https://m8tes.ai/api/v2";

/// Configuration for the run-streaming client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL of the API, including the version prefix.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Time allowed to establish the connection.
    ///
    /// Streaming reads are not bounded; a run may legitimately stay open for
    /// a long time.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Creates a config with default endpoint settings and the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Builds a config from `M8TES_API_KEY` and optional `M8TES_BASE_URL`.
    pub fn from_env() -> Result<Self, StreamError> {
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var(BASE_URL_ENV)
            && !base_url.trim().is_empty()
        {
            config = config.base_url(base_url);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.api_key.trim().is_empty() {
            return Err(StreamError::Config(format!(
                "missing API key; pass one explicitly or set {API_KEY_ENV}"
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(StreamError::Config("base_url must not be empty".into()));
        }
        Ok(())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
