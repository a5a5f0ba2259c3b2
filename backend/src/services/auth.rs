//! Authentication flows
//!
//! Registration, login, logout, token refresh, email verification and the
//! two halves of the password reset flow. Argon2 work always runs on the blocking pool via
//! [`PasswordService`]'s async helpers; JWT signing is inline.

use crate::auth::{AuthUser, PasswordService};
use crate::error::ApiError;
use crate::notify::{self, Delivery, Purpose};
use crate::state::AppState;
use crate::store::{NewUser, StoreError, UserRecord, UserUpdate};
use mahiberawi_shared::validation::normalize_email;
use mahiberawi_shared::{
    AuthError, AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse,
    RefreshTokenRequest, RegisterRequest, ResendVerificationRequest, ResetPasswordRequest, Role,
    VerifyEmailRequest,
};
use tracing::{error, info, warn};
use validator::Validate;

/// Returned by `forgot-password` whether or not the account exists
pub const RESET_REQUESTED_MESSAGE: &str = "If the email exists, a reset link has been sent";

/// Returned once a reset has been applied
pub const RESET_COMPLETED_MESSAGE: &str = "Password reset successfully";

/// Returned by `resend-verification` whether or not a mail went out
pub const VERIFICATION_REQUESTED_MESSAGE: &str =
    "If the account exists and is not yet verified, a verification email has been sent";

pub const LOGOUT_MESSAGE: &str = "Logout successful";

/// Authentication operations over the shared application state
pub struct AuthService;

impl AuthService {
    /// Create an unverified member account and sign it in
    ///
    /// A verification token is sent to the new address; delivery problems
    /// never fail the registration.
    pub async fn register(state: &AppState, req: RegisterRequest) -> Result<AuthResponse, ApiError> {
        let email = normalize_email(&req.email);
        let full_name = req.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(ApiError::validation("fullName", "Full name is required"));
        }

        if state.store().find_by_email(&email).await?.is_some() {
            return Err(StoreError::Conflict.into());
        }

        let password_hash = PasswordService::hash_async(req.password).await?;
        let user = state
            .store()
            .create(NewUser {
                email,
                full_name,
                password_hash,
                role: Role::Member,
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        Self::send_verification(state, &user);
        Self::session(state, &user)
    }

    /// Exchange email and password for tokens
    ///
    /// Unknown email and wrong password are indistinguishable: same error,
    /// and both pay for one argon2 verification.
    pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthResponse, ApiError> {
        let email = normalize_email(&req.email);

        let Some(user) = state.store().find_by_email(&email).await? else {
            PasswordService::verify_unknown_account(req.password).await?;
            return Err(AuthError::InvalidCredentials.into());
        };

        let valid = PasswordService::verify_async(req.password, user.password_hash.clone()).await?;
        if !valid {
            info!(user_id = %user.id, "Login failed");
            return Err(AuthError::InvalidCredentials.into());
        }

        if state.config().auth.require_verified_email && !user.email_verified {
            info!(user_id = %user.id, "Login refused for unverified email");
            return Err(ApiError::Forbidden(
                "Please verify your email address before logging in".to_string(),
            ));
        }

        info!(user_id = %user.id, "User logged in");
        Self::session(state, &user)
    }

    /// Acknowledge a logout
    ///
    /// Tokens are stateless, so there is nothing to revoke; clients drop
    /// their tokens.
    pub fn logout(user: &AuthUser) -> MessageResponse {
        info!(user_id = %user.id, "User logged out");
        MessageResponse::ok(LOGOUT_MESSAGE)
    }

    /// Rotate a refresh token into a fresh token pair
    ///
    /// The role in the new access token is read from the store, never from
    /// the old tokens.
    pub async fn refresh(state: &AppState, req: RefreshTokenRequest) -> Result<AuthResponse, ApiError> {
        let subject = state.tokens().verify_refresh_token(&req.refresh_token)?;
        let user = state
            .store()
            .find_by_id(subject)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Self::session(state, &user)
    }

    /// Start a password reset
    ///
    /// The response is the same for known and unknown emails. For a known
    /// account a token is minted and handed to the notifier on a detached
    /// task.
    pub async fn request_reset(
        state: &AppState,
        req: ForgotPasswordRequest,
    ) -> Result<MessageResponse, ApiError> {
        let email = normalize_email(&req.email);

        if let Some(user) = state.store().find_by_email(&email).await? {
            match state.resets().issue(&user) {
                Ok(issued) => {
                    info!(user_id = %user.id, "Password reset requested");
                    notify::dispatch(
                        state.notifier(),
                        Delivery {
                            purpose: Purpose::PasswordReset,
                            to: user.email,
                            token: issued.token,
                            expires_at: issued.expires_at,
                        },
                    );
                }
                Err(e) => error!(user_id = %user.id, error = ?e, "Failed to issue reset token"),
            }
        }

        Ok(MessageResponse::ok(RESET_REQUESTED_MESSAGE))
    }

    /// Apply a password reset
    ///
    /// Every token problem (malformed, expired, wrong type, unknown account,
    /// already used) is reported as the same invalid-token error.
    pub async fn complete_reset(
        state: &AppState,
        req: ResetPasswordRequest,
    ) -> Result<MessageResponse, ApiError> {
        req.validate()?;

        let subject = state.resets().peek_subject(&req.token)?;
        let user = state
            .store()
            .find_by_id(subject)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        state.resets().verify(&req.token, &user)?;

        let password_hash = PasswordService::hash_async(req.password).await?;
        let update = UserUpdate {
            password_hash: Some(password_hash),
            if_password_hash: Some(user.password_hash.clone()),
            ..Default::default()
        };

        match state.store().update(user.id, update).await {
            Ok(_) => {
                info!(user_id = %user.id, "Password reset completed");
                Ok(MessageResponse::ok(RESET_COMPLETED_MESSAGE))
            }
            Err(StoreError::PreconditionFailed | StoreError::NotFound) => {
                warn!(user_id = %user.id, "Reset token lost a race with another reset");
                Err(AuthError::InvalidToken.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Confirm an email address and sign the account in
    ///
    /// Malformed, expired, foreign and already-used tokens all yield the
    /// same invalid-token error.
    pub async fn verify_email(
        state: &AppState,
        req: VerifyEmailRequest,
    ) -> Result<AuthResponse, ApiError> {
        let subject = state.verifications().peek_subject(&req.token)?;
        let user = state
            .store()
            .find_by_id(subject)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        state.verifications().verify(&req.token, &user)?;

        let user = state
            .store()
            .update(
                user.id,
                UserUpdate {
                    email_verified: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| match e {
                StoreError::NotFound => ApiError::from(AuthError::InvalidToken),
                e => e.into(),
            })?;

        info!(user_id = %user.id, "Email verified");
        Self::session(state, &user)
    }

    /// Send a fresh verification token
    ///
    /// Answers the same for unknown, verified and unverified accounts; only
    /// the last kind gets a delivery.
    pub async fn resend_verification(
        state: &AppState,
        req: ResendVerificationRequest,
    ) -> Result<MessageResponse, ApiError> {
        let email = normalize_email(&req.email);

        if let Some(user) = state.store().find_by_email(&email).await? {
            if !user.email_verified {
                info!(user_id = %user.id, "Verification email requested");
                Self::send_verification(state, &user);
            }
        }

        Ok(MessageResponse::ok(VERIFICATION_REQUESTED_MESSAGE))
    }

    fn send_verification(state: &AppState, user: &UserRecord) {
        match state.verifications().issue(user) {
            Ok(issued) => notify::dispatch(
                state.notifier(),
                Delivery {
                    purpose: Purpose::EmailVerification,
                    to: user.email.clone(),
                    token: issued.token,
                    expires_at: issued.expires_at,
                },
            ),
            Err(e) => error!(user_id = %user.id, error = ?e, "Failed to issue verification token"),
        }
    }

    fn session(state: &AppState, user: &UserRecord) -> Result<AuthResponse, ApiError> {
        let tokens = state.tokens();
        let access = tokens.issue_access_token(user.id, user.role)?;
        let refresh = tokens.issue_refresh_token(user.id)?;

        Ok(AuthResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.access_token_expiry_secs(),
            expires_at: access.expires_at,
            user: user.profile(),
        })
    }
}
