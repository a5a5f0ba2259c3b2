//! Signed-in user routes

use crate::auth::{require_auth, AuthUser};
use crate::error::ApiResult;
use crate::services::UserService;
use crate::state::AppState;
use axum::{extract::State, middleware, routing::get, Json, Router};
use mahiberawi_shared::UserProfile;

pub fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// GET /api/users/profile
async fn profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<UserProfile>> {
    Ok(Json(UserService::get_profile(&state, user.id).await?))
}
