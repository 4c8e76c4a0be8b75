use std::time::Duration;

use crate::errors::ToolError;

const DEFAULT_API_VERSION: &str = "2025-01-01-preview";

/// Configuration for the DIAL transport client.
#[derive(Clone, Debug)]
pub struct DialClientConfig {
    /// Base URL of the DIAL core (for example `http://localhost:8080`).
    pub endpoint: String,
    /// Key sent in the `api-key` header.
    pub api_key: String,
    /// Value of the `api-version` query parameter.
    pub api_version: String,
    /// Default HTTP timeout for requests.
    pub timeout: Duration,
}

impl DialClientConfig {
    /// Creates a config with sensible defaults.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `DIAL_ENDPOINT` and `DIAL_API_KEY`.
    pub fn from_env() -> Result<Self, ToolError> {
        let endpoint = std::env::var("DIAL_ENDPOINT").unwrap_or_default();
        if endpoint.trim().is_empty() {
            return Err(ToolError::Config(
                "missing DIAL_ENDPOINT for DIAL transport".into(),
            ));
        }
        let api_key = std::env::var("DIAL_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(ToolError::Config(
                "missing DIAL_API_KEY for DIAL transport".into(),
            ));
        }
        Ok(Self::new(endpoint, api_key))
    }

    /// Overrides the `api-version` query parameter.
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Overrides the default HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            deployment,
            self.api_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_trims_trailing_slash() {
        let config = DialClientConfig::new("http://dial.local/", "key");
        assert_eq!(
            config.completions_url("web-search-agent"),
            "http://dial.local/openai/deployments/web-search-agent/chat/completions?api-version=2025-01-01-preview"
        );
    }

    #[test]
    fn builder_setters_override_defaults() {
        let config = DialClientConfig::new("http://dial.local", "key")
            .api_version("2024-02-01")
            .timeout(Duration::from_secs(5));
        assert_eq!(config.api_version, "2024-02-01");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
