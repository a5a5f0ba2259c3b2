//! JWT token generation and validation
//!
//! Access and refresh tokens are stateless HS256 JWTs. Keys are derived
//! once at startup and shared behind `Arc`s, so cloning the service is
//! cheap and per-request work is a single HMAC.

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use mahiberawi_shared::{AuthError, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    PasswordReset,
    EmailVerification,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub token_type: TokenType,
    /// Role snapshot; only access tokens carry one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Unique token ID, keeps tokens minted in the same second distinct
    pub jti: String,
}

impl Claims {
    /// Claims expiring `ttl_secs` from now
    ///
    /// Fails instead of overflowing when the lifetime puts the expiry
    /// outside the representable date range.
    pub(crate) fn new(
        subject: Uuid,
        token_type: TokenType,
        role: Option<Role>,
        ttl_secs: i64,
    ) -> Result<Self> {
        let now = Utc::now();
        let exp = Duration::try_seconds(ttl_secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| anyhow::anyhow!("Token lifetime of {}s is out of range", ttl_secs))?;
        Ok(Self {
            sub: subject.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type,
            role,
            jti: Uuid::new_v4().to_string(),
        })
    }

    pub fn subject(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly minted token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Identity proven by a valid access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedAccess {
    pub subject: Uuid,
    pub role: Role,
}

/// Pre-computed JWT keys for efficient token operations
/// These are expensive to create, so we cache them in AppState
#[derive(Clone)]
pub struct JwtKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl JwtKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret)),
            decoding: Arc::new(DecodingKey::from_secret(secret)),
        }
    }

    /// Keys for `secret` scoped to `context` and bound to `binding`
    ///
    /// Tokens signed with these keys stop verifying as soon as the bound
    /// value changes.
    pub(crate) fn derive(secret: &[u8], context: &[u8], binding: &str) -> Self {
        let mut material = Vec::with_capacity(secret.len() + context.len() + binding.len());
        material.extend_from_slice(secret);
        material.extend_from_slice(context);
        material.extend_from_slice(binding.as_bytes());
        Self::new(&material)
    }

    pub fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }

    pub fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }
}

/// Sign claims with HS256
pub(crate) fn sign(claims: &Claims, keys: &JwtKeys) -> Result<IssuedToken> {
    let token = encode(&Header::new(Algorithm::HS256), claims, keys.encoding())
        .map_err(|e| anyhow::anyhow!("Failed to sign {:?} token: {}", claims.token_type, e))?;
    Ok(IssuedToken {
        token,
        expires_at: claims.expires_at(),
    })
}

/// Verify signature, expiry and token type
///
/// Expiry is checked with zero leeway. A structurally valid, correctly
/// signed but expired token yields [`AuthError::TokenExpired`]; every other
/// failure yields [`AuthError::InvalidToken`].
pub(crate) fn verify(token: &str, keys: &JwtKeys, expected: TokenType) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let claims = decode::<Claims>(token, keys.decoding(), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

    if claims.token_type != expected {
        return Err(AuthError::InvalidToken);
    }
    Ok(claims)
}

/// Read the subject of an account-bound token without checking the signature
///
/// The verifying key depends on the account, so the account has to be found
/// first. Nothing read here is trusted until the token is verified.
pub(crate) fn peek_subject(token: &str, expected: TokenType) -> Result<Uuid, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let claims = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|_| AuthError::InvalidToken)?
        .claims;
    if claims.token_type != expected {
        return Err(AuthError::InvalidToken);
    }
    claims.subject()
}

/// Token lifetimes in seconds
#[derive(Debug, Clone, Copy)]
pub struct TokenTtl {
    pub access_secs: i64,
    pub refresh_secs: i64,
}

/// JWT service for access and refresh tokens
#[derive(Clone)]
pub struct TokenService {
    access_keys: JwtKeys,
    refresh_keys: JwtKeys,
    ttl: TokenTtl,
}

impl TokenService {
    /// Create a new JWT service with pre-computed keys
    ///
    /// Refresh tokens are signed with `refresh_secret` when given, otherwise
    /// with the access secret; the `token_type` claim keeps the two apart
    /// either way.
    pub fn new(secret: &str, refresh_secret: Option<&str>, ttl: TokenTtl) -> Self {
        let access_keys = JwtKeys::new(secret.as_bytes());
        let refresh_keys = match refresh_secret {
            Some(s) => JwtKeys::new(s.as_bytes()),
            None => access_keys.clone(),
        };
        Self {
            access_keys,
            refresh_keys,
            ttl,
        }
    }

    /// Mint an access token binding `subject` to `role`
    pub fn issue_access_token(&self, subject: Uuid, role: Role) -> Result<IssuedToken> {
        let claims = Claims::new(subject, TokenType::Access, Some(role), self.ttl.access_secs)?;
        sign(&claims, &self.access_keys)
    }

    /// Mint a refresh token; it carries no role
    pub fn issue_refresh_token(&self, subject: Uuid) -> Result<IssuedToken> {
        let claims = Claims::new(subject, TokenType::Refresh, None, self.ttl.refresh_secs)?;
        sign(&claims, &self.refresh_keys)
    }

    /// Verify an access token and return the identity it proves
    pub fn verify_access_token(&self, token: &str) -> Result<VerifiedAccess, AuthError> {
        let claims = verify(token, &self.access_keys, TokenType::Access)?;
        let role = claims.role.ok_or(AuthError::InvalidToken)?;
        Ok(VerifiedAccess {
            subject: claims.subject()?,
            role,
        })
    }

    /// Verify a refresh token and return its subject
    pub fn verify_refresh_token(&self, token: &str) -> Result<Uuid, AuthError> {
        verify(token, &self.refresh_keys, TokenType::Refresh)?.subject()
    }

    /// Get access token expiry in seconds
    #[inline]
    pub fn access_token_expiry_secs(&self) -> i64 {
        self.ttl.access_secs
    }
}
