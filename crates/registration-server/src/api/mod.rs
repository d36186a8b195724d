//! HTTP API for the registration flow.

mod cookie;
mod handlers;
mod middleware;
mod types;

pub use cookie::SessionCookie;
pub use handlers::*;
pub use middleware::{logging_middleware, rate_limit_middleware, RateLimitState};
pub use types::*;

use crate::backend::InMemoryBackend;
use axum::{
    http::Request,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use notify_client::SmsGatewayClient;
use registration::RegistrationOrchestrator;
use session_store::MemorySessionStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug_span;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Registration flow
    pub orchestrator: Arc<RegistrationOrchestrator>,
    /// Session store, for health reporting
    pub sessions: Arc<MemorySessionStore>,
    /// Session cookie codec
    pub cookie: Arc<SessionCookie>,
    /// SMS gateway, when SMS is actually delivered
    pub sms_gateway: Option<Arc<SmsGatewayClient>>,
}

impl AppState {
    /// Create new application state.
    pub fn new(backend: &InMemoryBackend, cookie: SessionCookie) -> Self {
        Self {
            orchestrator: Arc::new(backend.orchestrator.clone()),
            sessions: backend.sessions.clone(),
            cookie: Arc::new(cookie),
            sms_gateway: None,
        }
    }

    /// Report the gateway's reachability on the health endpoint.
    pub fn with_sms_gateway(mut self, gateway: Option<Arc<SmsGatewayClient>>) -> Self {
        self.sms_gateway = gateway;
        self
    }
}

/// Create the API router with the default rate limit.
pub fn create_router(state: AppState) -> Router {
    create_router_with_rate_limit(state, RateLimitState::new(600))
}

/// Create the API router with custom rate limiting.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        debug_span!("request", method = %request.method(), path = %request.uri().path())
    });

    Router::new()
        .route("/health", get(handlers::health))
        // Registration steps
        .route(
            "/register",
            get(handlers::show_registration_form).post(handlers::process_registration_form),
        )
        .route("/register/step", get(handlers::registration_step))
        .route("/register/validation", post(handlers::validate_info))
        .route(
            "/register/resendvalidation",
            post(handlers::resend_validation_info),
        )
        .route("/register/smsconfirmed", get(handlers::check_sms_confirmation))
        .route(
            "/register/emailconfirmed",
            get(handlers::check_email_confirmation),
        )
        .route("/register/smsconfirmation", post(handlers::confirm_sms_code))
        .route("/register/resendsms", post(handlers::resend_sms))
        .route("/validateusername", get(handlers::validate_username))
        // Links sent by SMS and email
        .route("/phonevalidation", get(handlers::phone_link))
        .route("/emailvalidation", get(handlers::email_link))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(trace)
        .with_state(state)
}
