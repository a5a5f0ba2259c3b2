//! Email verification tokens
//!
//! Same construction as reset tokens, but the key is bound to the address
//! being confirmed. A token stops verifying once the account is verified
//! or its email changes.

use super::jwt::{self, Claims, IssuedToken, JwtKeys, TokenType};
use crate::store::UserRecord;
use anyhow::Result;
use mahiberawi_shared::AuthError;
use std::sync::Arc;
use uuid::Uuid;

const KEY_CONTEXT: &[u8] = b"\0email-verification\0";

/// Issues and checks email verification tokens
#[derive(Clone)]
pub struct VerificationTokenService {
    secret: Arc<[u8]>,
    ttl_secs: i64,
}

impl VerificationTokenService {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            secret: Arc::from(secret.as_bytes()),
            ttl_secs,
        }
    }

    fn keys_for(&self, user: &UserRecord) -> JwtKeys {
        JwtKeys::derive(&self.secret, KEY_CONTEXT, &user.email)
    }

    pub fn issue(&self, user: &UserRecord) -> Result<IssuedToken> {
        let claims = Claims::new(user.id, TokenType::EmailVerification, None, self.ttl_secs)?;
        jwt::sign(&claims, &self.keys_for(user))
    }

    pub fn peek_subject(&self, token: &str) -> Result<Uuid, AuthError> {
        jwt::peek_subject(token, TokenType::EmailVerification)
    }

    /// Verify `token` for an account that is still unverified
    pub fn verify(&self, token: &str, user: &UserRecord) -> Result<(), AuthError> {
        if user.email_verified {
            return Err(AuthError::InvalidToken);
        }
        let claims = jwt::verify(token, &self.keys_for(user), TokenType::EmailVerification)?;
        if claims.subject()? != user.id {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }
}
