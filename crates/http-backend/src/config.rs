use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Builder for [`HttpBackendConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct HttpBackendConfigBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl HttpBackendConfigBuilder {
    /// Creates a builder with every option unset.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend origin, e.g. `https://chat.example.com`.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the per-request timeout.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> HttpBackendConfig {
        let base_url = self
            .base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        HttpBackendConfig {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        }
    }
}

/// Configuration for [`crate::HttpBackend`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HttpBackendConfig {
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
}

impl HttpBackendConfig {
    /// Returns the backend origin, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the per-request timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HttpBackendConfigBuilder::new().build();
        assert_eq!(config.base_url(), "http://localhost:8000");
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_trailing_slash() {
        let config = HttpBackendConfigBuilder::new()
            .with_base_url("https://chat.example.com/ ")
            .build();
        assert_eq!(
            config.url("/api/v1/auth/me"),
            "https://chat.example.com/api/v1/auth/me"
        );

        let config = HttpBackendConfigBuilder::new().with_base_url("").build();
        assert_eq!(config.base_url(), "http://localhost:8000");
    }
}
