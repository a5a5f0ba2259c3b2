//! Authentication routes
//!
//! Registration, login, token refresh, email verification and password
//! reset. All of them sit behind the admission limiter; `/me` and `/logout`
//! also need a bearer token.

use crate::auth::{require_auth, AuthUser};
use crate::error::ApiResult;
use crate::extract::ValidatedJson;
use crate::services::{AuthService, UserService};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use mahiberawi_shared::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, RefreshTokenRequest,
    RegisterRequest, ResendVerificationRequest, ResetPasswordRequest, UserProfile,
    VerifyEmailRequest,
};

/// Create auth routes
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/verify-email", post(verify_email))
        .route("/resend-verification", post(resend_verification))
        .merge(protected)
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let session = AuthService::register(&state, req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    Ok(Json(AuthService::login(&state, req).await?))
}

/// POST /api/auth/refresh-token
async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> ApiResult<Json<AuthResponse>> {
    Ok(Json(AuthService::refresh(&state, req).await?))
}

/// POST /api/auth/forgot-password
async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(AuthService::request_reset(&state, req).await?))
}

/// POST /api/auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(AuthService::complete_reset(&state, req).await?))
}

/// GET /api/auth/me
async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<UserProfile>> {
    Ok(Json(UserService::get_profile(&state, user.id).await?))
}

/// POST /api/auth/logout
async fn logout(user: AuthUser) -> Json<MessageResponse> {
    Json(AuthService::logout(&user))
}

/// POST /api/auth/verify-email
async fn verify_email(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> ApiResult<Json<AuthResponse>> {
    Ok(Json(AuthService::verify_email(&state, req).await?))
}

/// POST /api/auth/resend-verification
async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResendVerificationRequest>,
) -> ApiResult<Json<MessageResponse>> {
    Ok(Json(AuthService::resend_verification(&state, req).await?))
}
