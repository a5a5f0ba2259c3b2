//! User account queries and administration

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{Page, StoreError, UserUpdate};
use mahiberawi_shared::{ListUsersQuery, Role, UserListResponse, UserProfile};
use tracing::info;
use uuid::Uuid;

/// User account operations
pub struct UserService;

impl UserService {
    /// Get user profile
    pub async fn get_profile(state: &AppState, user_id: Uuid) -> Result<UserProfile, ApiError> {
        let user = state
            .store()
            .find_by_id(user_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(user.profile())
    }

    /// One page of accounts, oldest first
    pub async fn list_users(
        state: &AppState,
        query: ListUsersQuery,
    ) -> Result<UserListResponse, ApiError> {
        let page = Page {
            limit: query.limit(),
            offset: query.offset(),
        };
        let users = state.store().list(page).await?;

        Ok(UserListResponse {
            users: users.iter().map(|u| u.profile()).collect(),
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Change another account's role
    ///
    /// Callers cannot change their own role, so the last super admin cannot
    /// demote themselves by accident.
    pub async fn update_role(
        state: &AppState,
        actor: &AuthUser,
        target: Uuid,
        role: Role,
    ) -> Result<UserProfile, ApiError> {
        if actor.id == target {
            return Err(ApiError::BadRequest("You cannot change your own role".to_string()));
        }

        let user = state
            .store()
            .update(
                target,
                UserUpdate {
                    role: Some(role),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            user_id = %user.id,
            actor_id = %actor.id,
            role = %user.role,
            "User role changed"
        );
        Ok(user.profile())
    }
}
