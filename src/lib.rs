pub mod client;
pub mod clients;
pub mod config;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod websocket;
pub mod ws;

use std::sync::Arc;
use tracing::{error, warn};

use clients::app_service_client::AppServiceClient;
use config::Config;
use services::session_store::{NoopSessionStore, SessionStore};
use ws::membership::MembershipCache;
use ws::registry::RoomRegistry;
use ws::tickets::TicketStore;

/// Everything the HTTP handlers and websocket connections share
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<RoomRegistry>,
    pub tickets: Arc<TicketStore>,
    pub membership: MembershipCache,
    pub store: Arc<dyn SessionStore>,
}

impl AppState {
    /// Build the state, talking to the app service when one is configured
    pub fn new(config: Config) -> Self {
        let store: Arc<dyn SessionStore> = match AppServiceClient::from_config(&config) {
            Ok(Some(client)) => Arc::new(client),
            Ok(None) => {
                warn!("No app service URL configured - chat messages will not be persisted");
                Arc::new(NoopSessionStore)
            }
            Err(e) => {
                error!("Failed to build app service client: {}", e);
                Arc::new(NoopSessionStore)
            }
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn SessionStore>) -> Self {
        let membership = MembershipCache::new(store.clone(), config.membership_cache_ttl());
        let tickets = Arc::new(TicketStore::new(config.ticket_ttl()));
        Self {
            config: Arc::new(config),
            registry: Arc::new(RoomRegistry::new()),
            tickets,
            membership,
            store,
        }
    }
}
