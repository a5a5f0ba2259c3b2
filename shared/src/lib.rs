//! Mahiberawi Shared Library
//!
//! Wire types, the role model and auth error kinds shared between the
//! backend and its clients.

pub mod errors;
pub mod models;
pub mod types;
pub mod validation;

// Re-export commonly used items
pub use errors::*;
pub use models::Role;
pub use types::*;
