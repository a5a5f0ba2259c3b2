//! In-process credential store

use super::{CredentialStore, NewUser, Page, StoreError, UserRecord, UserUpdate};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    by_email: HashMap<String, Uuid>,
}

/// Credential store kept in memory for the lifetime of the process
///
/// Both indexes live under one lock so the email uniqueness check and the
/// insert happen atomically.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a user outright. The auth core never deletes accounts; this
    /// exists so tests can simulate deletion by an outside system.
    pub fn remove(&self, id: Uuid) -> Option<UserRecord> {
        let mut inner = self.inner.write();
        let user = inner.users.remove(&id)?;
        inner.by_email.remove(&user.email);
        Some(user)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.inner.read().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .by_email
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.write();
        if inner.by_email.contains_key(&user.email) {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email,
            full_name: user.full_name,
            password_hash: user.password_hash,
            role: user.role,
            email_verified: false,
            created_at: now,
            updated_at: now,
        };
        inner.by_email.insert(record.email.clone(), record.id);
        inner.users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.write();
        let record = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;

        if let Some(expected) = &update.if_password_hash {
            if &record.password_hash != expected {
                return Err(StoreError::PreconditionFailed);
            }
        }

        if let Some(hash) = update.password_hash {
            record.password_hash = hash;
        }
        if let Some(role) = update.role {
            record.role = role;
        }
        if let Some(name) = update.full_name {
            record.full_name = name;
        }
        if let Some(verified) = update.email_verified {
            record.email_verified = verified;
        }
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    async fn list(&self, page: Page) -> Result<Vec<UserRecord>, StoreError> {
        let inner = self.inner.read();
        let mut users: Vec<&UserRecord> = inner.users.values().collect();
        users.sort_by_key(|u| (u.created_at, u.id));
        Ok(users
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }
}
