//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::gateway::ConnectionGateway;
use crate::generation::{GenerationController, GenerationRegistry, OllamaBackend};
use crate::search::SearchAugmenter;

/// The controller wired to the production backend, search and store.
pub type ChatController = GenerationController<OllamaBackend, SearchAugmenter, SqliteStore>;

/// State shared across all HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Users, sessions, messages, ratings and runtime config.
    pub store: Arc<SqliteStore>,
    /// One active generation per owner.
    pub registry: Arc<dyn GenerationRegistry>,
    /// Open WebSocket connections grouped by owner.
    pub gateway: Arc<ConnectionGateway>,
    pub backend: Arc<OllamaBackend>,
    pub controller: ChatController,
}

impl AppState {
    pub fn new(
        config: Config,
        store: SqliteStore,
        backend: OllamaBackend,
        augmenter: SearchAugmenter,
        registry: Arc<dyn GenerationRegistry>,
    ) -> Self {
        let store = Arc::new(store);
        let backend = Arc::new(backend);
        let controller = GenerationController::new(
            Arc::clone(&backend),
            Arc::new(augmenter),
            Arc::clone(&store),
            Arc::clone(&registry),
            config.search_pacing,
        );
        Self {
            config: Arc::new(config),
            store,
            registry,
            gateway: Arc::new(ConnectionGateway::new()),
            backend,
            controller,
        }
    }
}
