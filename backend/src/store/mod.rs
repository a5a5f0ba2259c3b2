//! Credential store
//!
//! The auth core only needs a handful of operations on user records. They sit
//! behind [`CredentialStore`] so the PostgreSQL implementation used in
//! deployments and the in-memory one used in development and tests are
//! interchangeable.

mod memory;
mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mahiberawi_shared::{Role, UserProfile};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Email already registered")]
    Conflict,

    #[error("Record changed since it was read")]
    PreconditionFailed,

    #[error("Store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Stored user account
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Public view of the record, without the password hash
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.to_string(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            email_verified: self.email_verified,
            created_at: self.created_at,
        }
    }
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Expected to be normalised already
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub full_name: Option<String>,
    pub email_verified: Option<bool>,
    /// Apply only if the stored hash still equals this value
    pub if_password_hash: Option<String>,
}

/// One page of accounts, oldest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

/// Persistence contract for user accounts
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the email is taken
    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Fails with [`StoreError::NotFound`] when no record has this id and
    /// with [`StoreError::PreconditionFailed`] when `if_password_hash` no
    /// longer matches
    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<UserRecord, StoreError>;

    /// Accounts ordered by creation time, then id
    async fn list(&self, page: Page) -> Result<Vec<UserRecord>, StoreError>;

    /// Readiness check
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store handle shared through application state
pub type SharedStore = Arc<dyn CredentialStore>;
