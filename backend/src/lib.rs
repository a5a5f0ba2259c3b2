//! Mahiberawi Backend Library
//!
//! Authentication and authorization core: token issuance, the request
//! gate, password reset and per-client admission limiting. Exposed as a
//! library for the binary and the integration tests.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod limiter;
pub mod notify;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
