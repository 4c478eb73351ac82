//! Shared application state injected into every subscription and desk.

use std::sync::Arc;

use crate::api::{Backend, RestClient};
use crate::config::{SyncConfig, TransportMode};
use crate::domain::ModuleId;
use crate::error::SyncError;
use crate::persistence::{FileSettingsStore, SettingsStore};
use crate::service::AdviserDesk;
use crate::sync::{Feed, FeedValue, LiveSubscription};
use crate::transport::{SharedTransport, Transport, WsTransport};

/// Collaborators shared by all consumers.
///
/// Cheap to clone; every field is reference-counted.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pull interface and mutations.
    pub backend: Arc<dyn Backend>,
    /// Push channel.
    pub transport: Arc<dyn Transport>,
    /// Token, user, and headquarter selection.
    pub settings: Arc<dyn SettingsStore>,
}

impl AppState {
    /// Assembles the state from explicit collaborators.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        transport: Arc<dyn Transport>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            backend,
            transport,
            settings,
        }
    }

    /// Builds the production wiring: file settings, `reqwest` client, and a
    /// WebSocket transport (shared or dedicated per configuration).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let settings: Arc<dyn SettingsStore> =
            Arc::new(FileSettingsStore::new(config.settings_path.clone()));
        let backend: Arc<dyn Backend> = Arc::new(RestClient::new(
            &config.api_base_url,
            Arc::clone(&settings),
            config.pull_timeout,
        )?);

        let socket: Arc<dyn Transport> =
            Arc::new(WsTransport::new(config.ws_url.clone(), config.reconnect));
        let transport: Arc<dyn Transport> = match config.transport_mode {
            TransportMode::Dedicated => socket,
            TransportMode::Shared => {
                Arc::new(SharedTransport::new(socket, config.frame_bus_capacity))
            }
        };

        tracing::debug!(
            api = %config.api_base_url,
            ws = %config.ws_url,
            mode = ?config.transport_mode,
            "application state assembled"
        );
        Ok(Self::new(backend, transport, settings))
    }

    /// Creates an unmounted subscription for `feed`.
    #[must_use]
    pub fn subscribe<T: FeedValue>(&self, feed: Feed<T>) -> LiveSubscription<T> {
        LiveSubscription::new(feed, Arc::clone(&self.backend), Arc::clone(&self.transport))
    }

    /// Adviser desk for `module_id`.
    #[must_use]
    pub fn adviser_desk(&self, module_id: ModuleId) -> AdviserDesk {
        AdviserDesk::new(Arc::clone(&self.backend), module_id)
    }
}
