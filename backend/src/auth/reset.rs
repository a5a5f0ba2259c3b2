//! Password reset tokens
//!
//! A reset token is signed with a key derived from the signing secret and
//! the account's current password hash. Completing a reset stores a new
//! hash (fresh salt), which changes the key, so a consumed token can never
//! verify again. No consumed-token list is needed.

use super::jwt::{self, Claims, IssuedToken, JwtKeys, TokenType};
use crate::store::UserRecord;
use anyhow::Result;
use mahiberawi_shared::AuthError;
use std::sync::Arc;
use uuid::Uuid;

const KEY_CONTEXT: &[u8] = b"\0password-reset\0";

/// Issues and checks single-use password reset tokens
#[derive(Clone)]
pub struct ResetTokenService {
    secret: Arc<[u8]>,
    ttl_secs: i64,
}

impl ResetTokenService {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            secret: Arc::from(secret.as_bytes()),
            ttl_secs,
        }
    }

    fn keys_for(&self, user: &UserRecord) -> JwtKeys {
        JwtKeys::derive(&self.secret, KEY_CONTEXT, &user.password_hash)
    }

    /// Mint a reset token for `user`, bound to its current password hash
    pub fn issue(&self, user: &UserRecord) -> Result<IssuedToken> {
        let claims = Claims::new(user.id, TokenType::PasswordReset, None, self.ttl_secs)?;
        jwt::sign(&claims, &self.keys_for(user))
    }

    /// Account the token claims to be for; unverified
    pub fn peek_subject(&self, token: &str) -> Result<Uuid, AuthError> {
        jwt::peek_subject(token, TokenType::PasswordReset)
    }

    /// Verify `token` against the account's current password hash
    pub fn verify(&self, token: &str, user: &UserRecord) -> Result<(), AuthError> {
        let claims = jwt::verify(token, &self.keys_for(user), TokenType::PasswordReset)?;
        if claims.subject()? != user.id {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }
}
