//! PostgreSQL credential store

use super::{CredentialStore, NewUser, Page, StoreError, UserRecord, UserUpdate};
use crate::db;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mahiberawi_shared::Role;
use sqlx::PgPool;
use uuid::Uuid;

/// User row as stored; `role` is validated on the way out
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    full_name: String,
    password_hash: String,
    role: String,
    email_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| StoreError::Backend(anyhow!("user {}: {}", row.id, e)))?;

        Ok(UserRecord {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            password_hash: row.password_hash,
            role,
            email_verified: row.email_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.into())
}

/// Credential store over the `users` table
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, full_name, password_hash, role, email_verified, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, full_name, password_hash, role, email_verified, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let result = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, full_name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, full_name, password_hash, role, email_verified, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => row.try_into(),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::Conflict)
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> Result<UserRecord, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET
                password_hash = COALESCE($2, password_hash),
                role = COALESCE($3, role),
                full_name = COALESCE($4, full_name),
                email_verified = COALESCE($6, email_verified),
                updated_at = NOW()
            WHERE id = $1
              AND ($5::text IS NULL OR password_hash = $5)
            RETURNING id, email, full_name, password_hash, role, email_verified, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.password_hash)
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.full_name)
        .bind(update.if_password_hash.as_deref())
        .bind(update.email_verified)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        if let Some(row) = row {
            return row.try_into();
        }
        if update.if_password_hash.is_some() && self.find_by_id(id).await?.is_some() {
            return Err(StoreError::PreconditionFailed);
        }
        Err(StoreError::NotFound)
    }

    async fn list(&self, page: Page) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, full_name, password_hash, role, email_verified, created_at, updated_at
            FROM users
            ORDER BY created_at, id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(UserRecord::try_from).collect()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        db::health_check(&self.pool).await.map_err(StoreError::Backend)
    }
}
