//! Authentication middleware
//!
//! `require_auth` runs the gate and inserts the resulting [`AuthUser`] into
//! the request extensions. `require_roles` checks that identity against an
//! allow-list. Handlers read identity through the [`AuthUser`] extractor,
//! which only looks at the extensions and never re-derives it.

use super::gate::{self, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use mahiberawi_shared::{AuthError, Role};
use tracing::{debug, info};

/// Roles allowed to read accounts through the admin API
pub const ADMIN_ROLES: &[Role] = &[Role::Admin, Role::SuperAdmin];

/// Roles allowed to change other accounts' roles
pub const SUPER_ADMIN_ROLES: &[Role] = &[Role::SuperAdmin];

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| AuthError::MissingToken.into())
    }
}

/// Authenticate the request or reject it with 401
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    let user = state
        .gate()
        .authenticate(&parts.headers)
        .await
        .map_err(|e| {
            debug!(reason = %e, "Request rejected by auth gate");
            ApiError::from(e)
        })?;

    parts.extensions.insert(user);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Reject with 403 unless the authenticated role is in `allowed`
///
/// Must run after [`require_auth`]; without an identity it rejects with 401.
pub async fn require_roles(
    State(allowed): State<&'static [Role]>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = gate::restrict_to(request.extensions().get::<AuthUser>(), allowed).map_err(|e| {
        if e.is_forbidden() {
            if let Some(user) = request.extensions().get::<AuthUser>() {
                info!(
                    user_id = %user.id,
                    role = %user.role,
                    path = %request.uri().path(),
                    "Role check failed"
                );
            }
        }
        ApiError::from(e)
    })?;
    debug!(user_id = %user.id, role = %user.role, "Role check passed");
    Ok(next.run(request).await)
}
