//! Authentication and authorization
//!
//! JWT access/refresh tokens, argon2 password hashing, account-bound reset
//! and verification tokens, and the request gate that ties them to the
//! credential store.

mod gate;
mod jwt;
mod middleware;
mod password;
mod reset;
mod verification;

pub use gate::{extract_bearer, restrict_to, AuthGate, AuthUser, GateError};
pub use jwt::{Claims, IssuedToken, JwtKeys, TokenService, TokenTtl, TokenType, VerifiedAccess};
pub use middleware::{require_auth, require_roles, ADMIN_ROLES, SUPER_ADMIN_ROLES};
pub use password::PasswordService;
pub use reset::ResetTokenService;
pub use verification::VerificationTokenService;
