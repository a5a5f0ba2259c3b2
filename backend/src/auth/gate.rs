//! Auth gate
//!
//! Each stage takes the previous stage's value and either returns the next
//! one or rejects:
//!
//! ```text
//! headers -> extract_bearer -> &str -> verify -> VerifiedAccess
//!         -> resolve -> AuthUser -> restrict_to(roles) -> AuthUser
//! ```
//!
//! Rejections are [`AuthError`]s. Store failures are not rejections; they
//! surface as internal errors.

use super::jwt::{TokenService, VerifiedAccess};
use crate::config::RolePolicy;
use crate::error::ApiError;
use crate::store::{CredentialStore, StoreError};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use mahiberawi_shared::{AuthError, Role};
use thiserror::Error;
use uuid::Uuid;

/// Identity attached to a request once the gate lets it through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// Why the gate stopped a request
#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    Rejected(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Rejected(auth) => auth.into(),
            GateError::Store(store) => store.into(),
        }
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MissingToken)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingToken)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Admit `identity` only if its role is in `allowed`
pub fn restrict_to<'a>(
    identity: Option<&'a AuthUser>,
    allowed: &[Role],
) -> Result<&'a AuthUser, AuthError> {
    let identity = identity.ok_or(AuthError::MissingToken)?;
    if allowed.contains(&identity.role) {
        Ok(identity)
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Borrowed view over the pieces the gate needs
pub struct AuthGate<'a> {
    tokens: &'a TokenService,
    store: &'a dyn CredentialStore,
    policy: RolePolicy,
}

impl<'a> AuthGate<'a> {
    pub fn new(tokens: &'a TokenService, store: &'a dyn CredentialStore, policy: RolePolicy) -> Self {
        Self {
            tokens,
            store,
            policy,
        }
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedAccess, AuthError> {
        self.tokens.verify_access_token(token)
    }

    /// Confirm the account still exists and settle its role
    ///
    /// A valid token for a deleted account is rejected. Under
    /// [`RolePolicy::Token`] the role snapshot from the token is kept;
    /// under [`RolePolicy::Store`] the stored role wins.
    pub async fn resolve(&self, verified: VerifiedAccess) -> Result<AuthUser, GateError> {
        let record = self
            .store
            .find_by_id(verified.subject)
            .await?
            .ok_or(AuthError::UnknownAccount)?;

        let role = match self.policy {
            RolePolicy::Token => verified.role,
            RolePolicy::Store => record.role,
        };
        Ok(AuthUser {
            id: record.id,
            role,
        })
    }

    /// Run extraction, verification and identity resolution
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, GateError> {
        let token = extract_bearer(headers)?;
        let verified = self.verify(token)?;
        self.resolve(verified).await
    }
}
