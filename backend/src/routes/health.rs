//! Health checks
//!
//! `/health` and `/health/live` answer as long as the process serves
//! requests. `/health/ready` also asks the credential store and answers 503
//! while it is unreachable.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    Healthy,
    Unavailable,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_store: Option<StoreStatus>,
}

fn report(status: &'static str, credential_store: Option<StoreStatus>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        credential_store,
    })
}

pub async fn health_check() -> Json<HealthResponse> {
    report("healthy", None)
}

pub async fn liveness_check() -> Json<HealthResponse> {
    report("alive", None)
}

pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.store().health_check().await {
        Ok(()) => (StatusCode::OK, report("ready", Some(StoreStatus::Healthy))),
        Err(e) => {
            warn!(error = %e, "Credential store readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                report("not_ready", Some(StoreStatus::Unavailable)),
            )
        }
    }
}
