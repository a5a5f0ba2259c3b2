//! Account administration routes
//!
//! Reading a single account needs `admin` or `super_admin`; listing
//! accounts and changing roles need `super_admin`. Role checks run after
//! the gate has attached identity, so a request without a valid token gets
//! 401 before any 403.

use crate::auth::{require_auth, require_roles, AuthUser, ADMIN_ROLES, SUPER_ADMIN_ROLES};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::services::UserService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, patch},
    Json, Router,
};
use mahiberawi_shared::{ListUsersQuery, UpdateRoleRequest, UserListResponse, UserProfile};
use uuid::Uuid;

pub fn admin_routes(state: AppState) -> Router<AppState> {
    let readers = Router::new()
        .route("/users/:id", get(get_user))
        .route_layer(middleware::from_fn_with_state(ADMIN_ROLES, require_roles));

    let super_admins = Router::new()
        .route("/users", get(list_users))
        .route("/users/:id/role", patch(update_role))
        .route_layer(middleware::from_fn_with_state(SUPER_ADMIN_ROLES, require_roles));

    // route_layer wraps inside-out: require_auth runs first
    readers
        .merge(super_admins)
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::validation("id", "Invalid user id"))
}

/// GET /api/admin/users
async fn list_users(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<ListUsersQuery>,
) -> ApiResult<Json<UserListResponse>> {
    Ok(Json(UserService::list_users(&state, query).await?))
}

/// GET /api/admin/users/:id
async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<UserProfile>> {
    Ok(Json(UserService::get_profile(&state, parse_id(&id)?).await?))
}

/// PATCH /api/admin/users/:id/role
async fn update_role(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> ApiResult<Json<UserProfile>> {
    let profile = UserService::update_role(&state, &actor, parse_id(&id)?, req.role).await?;
    Ok(Json(profile))
}
