//! Registration server - Entry point.

use registration_server::{
    api::{create_router_with_rate_limit, AppState, RateLimitState, SessionCookie},
    backend::Transports,
    config::Config,
    InMemoryBackend,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting registration server");

    let transports = match Transports::from_config(&config) {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to create notification transports: {}", e);
            std::process::exit(1);
        }
    };

    let backend = InMemoryBackend::new(&config, &transports);
    info!(
        public_url = %config.registration.public_url,
        max_pending = config.registration.max_pending_registrations,
        "Registration flow ready"
    );

    let cookie = SessionCookie::new(
        &config.session.cookie_name,
        config.session.ttl,
        config.server.secure_cookies,
    );
    let state = AppState::new(&backend, cookie).with_sms_gateway(transports.sms_gateway.clone());

    let rate_limit = RateLimitState::new(config.rate_limit.global_per_minute);
    let app = create_router_with_rate_limit(state, rate_limit);

    // Bind to address
    let addr = SocketAddr::new(
        config
            .server
            .listen_addr
            .parse()
            .unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
