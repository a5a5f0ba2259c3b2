//! Business logic services
//!
//! Services hold the auth flows and account operations and coordinate the
//! credential store, token services and notifier held in [`AppState`].
//!
//! [`AppState`]: crate::state::AppState

pub mod auth;
pub mod user;

pub use auth::AuthService;
pub use user::UserService;
