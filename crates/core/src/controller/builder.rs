use std::sync::Arc;

use docchat_api::Backend;

use super::Controller;
use super::state::{ControllerState, EventCallback, RestoreSession};
use crate::backend_client::BackendClient;
use crate::config::ControllerConfig;
use crate::events::ControllerEvent;
use crate::session::Session;
use crate::store::{DurableStore, MemoryStore};
use crate::stream::{Reveal, SimulatedReveal};

/// [`Controller`] builder.
pub struct ControllerBuilder {
    backend: BackendClient,
    store: Option<Box<dyn DurableStore>>,
    config: ControllerConfig,
    reveal: Option<Arc<dyn Reveal>>,
    on_event: Option<EventCallback>,
}

impl ControllerBuilder {
    /// Creates a new builder with the specified backend.
    #[inline]
    pub fn with_backend<B: Backend + 'static>(backend: B) -> Self {
        Self {
            backend: BackendClient::new(backend),
            store: None,
            config: Default::default(),
            reveal: None,
            on_event: None,
        }
    }

    /// Sets the durable store. Defaults to an in-memory one.
    #[inline]
    pub fn with_store<S: DurableStore>(mut self, store: S) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Sets the timing configuration.
    #[inline]
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the simulated reveal.
    #[inline]
    pub fn with_reveal<R: Reveal>(mut self, reveal: R) -> Self {
        self.reveal = Some(Arc::new(reveal));
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

    /// Builds the controller and starts restoring a stored session.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> Controller {
        let ControllerBuilder {
            backend,
            store,
            config,
            reveal,
            on_event,
        } = self;

        let store = store.unwrap_or_else(|| -> Box<dyn DurableStore> {
            Box::new(MemoryStore::default())
        });
        let reveal = reveal.unwrap_or_else(|| -> Arc<dyn Reveal> {
            Arc::new(SimulatedReveal::new(config.stream_tick))
        });
        let session = Session::restore(store);
        let state = ControllerState::new(
            backend.clone(),
            config,
            reveal,
            on_event,
            session,
        );

        let controller = Controller {
            handle: super::Handle::spawn(state, Some("controller")),
            backend,
        };
        controller.post(RestoreSession);
        controller
    }
}
