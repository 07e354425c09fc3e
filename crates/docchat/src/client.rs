use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use docchat_core::store::FileStore;
use docchat_core::{Controller, ControllerBuilder, ControllerConfig, ControllerEvent};
use docchat_http_backend::{HttpBackend, HttpBackendConfigBuilder};

/// Environment variable holding the backend base URL.
pub const API_URL_VAR: &str = "DOCCHAT_API_URL";
/// Environment variable holding the path of the session file.
pub const STATE_FILE_VAR: &str = "DOCCHAT_STATE_FILE";

const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Where the client connects to and keeps its state.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    api_url: String,
    state_file: PathBuf,
    request_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Reads the configuration from `DOCCHAT_API_URL` and
    /// `DOCCHAT_STATE_FILE`, falling back to a local backend and a file in
    /// the user's config directory.
    pub fn from_env() -> Self {
        let api_url = env::var(API_URL_VAR)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned());
        let state_file = env::var_os(STATE_FILE_VAR)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_state_file);
        Self {
            api_url,
            state_file,
            request_timeout: None,
        }
    }

    /// Sets the backend base URL.
    #[inline]
    pub fn with_api_url<S: Into<String>>(mut self, api_url: S) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Sets the path of the session file.
    #[inline]
    pub fn with_state_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.state_file = path.into();
        self
    }

    /// Sets the deadline of backend requests.
    #[inline]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Returns the backend base URL.
    #[inline]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Returns the path of the session file.
    #[inline]
    pub fn state_file(&self) -> &Path {
        &self.state_file
    }
}

fn default_state_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docchat")
        .join("state.json")
}

/// A client builder.
///
/// The built client is a [`Controller`] talking to the HTTP backend, with
/// its session persisted to the configured state file.
pub struct ClientBuilder {
    config: ClientConfig,
    controller_config: ControllerConfig,
    on_event: Option<Box<dyn Fn(ControllerEvent) + Send + Sync>>,
}

impl ClientBuilder {
    /// Creates a client builder with the specified configuration.
    pub fn new(config: ClientConfig) -> Self {
        let mut controller_config = ControllerConfig::default();
        if let Some(timeout) = config.request_timeout {
            controller_config = controller_config.with_request_timeout(timeout);
        }
        Self {
            config,
            controller_config,
            on_event: None,
        }
    }

    /// Sets the controller configuration.
    #[inline]
    pub fn with_controller_config(mut self, config: ControllerConfig) -> Self {
        self.controller_config = config;
        self
    }

    /// Attaches a callback receiving every [`ControllerEvent`].
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(ControllerEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Box::new(on_event));
        self
    }

    /// Builds the client. Must be called within a tokio runtime.
    ///
    /// Fails if the state file exists but can't be read.
    pub fn build(self) -> io::Result<Controller> {
        let ClientBuilder {
            config,
            controller_config,
            on_event,
        } = self;

        let mut backend_config =
            HttpBackendConfigBuilder::new().with_base_url(&config.api_url);
        if let Some(timeout) = config.request_timeout {
            backend_config = backend_config.with_timeout(timeout);
        }
        let backend = HttpBackend::new(backend_config.build());
        let store = FileStore::open(config.state_file.clone())?;
        info!(
            "connecting to {} with state in {:?}",
            config.api_url, config.state_file
        );

        let mut builder = ControllerBuilder::with_backend(backend)
            .with_store(store)
            .with_config(controller_config);
        if let Some(on_event) = on_event {
            builder = builder.on_event(on_event);
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_env()
            .with_api_url("http://rag.internal:9000")
            .with_state_file("/tmp/docchat.json");
        assert_eq!(config.api_url(), "http://rag.internal:9000");
        assert_eq!(config.state_file(), Path::new("/tmp/docchat.json"));
    }

    #[test]
    fn test_default_state_file() {
        let path = default_state_file();
        assert!(path.ends_with("docchat/state.json"));
    }

    #[tokio::test]
    async fn test_build_with_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::from_env()
            .with_api_url("http://127.0.0.1:9")
            .with_state_file(dir.path().join("state.json"));
        let controller = ClientBuilder::new(config).build().unwrap();

        let snapshot = controller.snapshot().await.unwrap();
        assert!(!snapshot.authenticated);
    }
}
