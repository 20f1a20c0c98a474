use std::panic;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tutorconnect_live::config::Config;
use tutorconnect_live::routes::app;
use tutorconnect_live::ws::tickets::spawn_sweeper;
use tutorconnect_live::AppState;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Load configuration before tracing so the filter can come from it
    let loaded = Config::load();
    let filter = match &loaded {
        Ok(config) => config.log_filter(),
        Err(_) => Config::default().log_filter(),
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let config = loaded.unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });
    info!("Starting server in {} environment...", config.environment);

    if !config.auth_enabled() {
        warn!("No auth JWT secret configured - websocket connections are anonymous");
    }
    if config.require_membership && config.app_service_url.is_none() {
        warn!("Membership checks are enabled without an app service - every user is accepted");
    }

    let address = config.server_address();
    let sweep_interval = config.sweep_interval();
    let state = AppState::new(config);

    // Expire unused websocket tickets
    let sweeper = spawn_sweeper(state.tickets.clone(), sweep_interval);

    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", address, e);
            return;
        }
    };

    info!("🚀 Server running on http://{}", address);
    info!("📡 WebSocket available at ws://{}/ws", address);
    info!("📚 Swagger UI available at http://{}/swagger", address);

    if let Err(e) = axum::serve(listener, app(state)).await {
        error!("Server error: {}", e);
    }
    sweeper.abort();
}
