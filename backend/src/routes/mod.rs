//! Route definitions for the Mahiberawi API
//!
//! Health checks sit outside the admission limiter. Everything under
//! `/api` passes the limiter first; protected routes then pass the auth
//! gate and, for administration, a role check.

use crate::limiter;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware,
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

mod admin;
mod auth;
mod health;
mod users;

#[cfg(test)]
mod auth_tests;

/// Largest request body accepted; auth payloads are a few hundred bytes
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

pub use admin::admin_routes;
pub use auth::auth_routes;
pub use users::user_routes;

/// Create the main application router with all middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .nest("/api", api_routes(state.clone()))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PATCH])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Routes under `/api`, all behind the admission limiter
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { "Mahiberawi API" }))
        .nest("/auth", auth::auth_routes(state.clone()))
        .nest("/users", users::user_routes(state.clone()))
        .nest("/admin", admin::admin_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state, limiter::admit))
}
