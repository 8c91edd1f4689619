use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{
    ActiveSession, AuditAction, NewUser, NodeTaskSummary, ProfileUpdate, User, UserProfile,
};
use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Users and their profiles.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Inserts the user with `login_count = 1`, `last_login = now` and an
    /// empty profile. Unique collisions surface as `StoreError::Duplicate`.
    async fn create_user(&self, new: NewUser, now: OffsetDateTime) -> StoreResult<User>;

    /// Bumps the login counter and sets the last login time.
    async fn record_login(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<User>;

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> StoreResult<()>;

    /// Applies the present fields; returns `None` when the user is gone.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<Option<User>>;

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> StoreResult<()>;

    /// Session with this token whose expiry is after `now`.
    async fn find_active(&self, token: &str, now: OffsetDateTime)
        -> StoreResult<Option<ActiveSession>>;

    async fn touch(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<()>;

    /// Returns the number of rows removed (0 or 1).
    async fn delete_by_token(&self, token: &str) -> StoreResult<u64>;

    /// Removes every session of `user_id` except the one holding `keep`.
    async fn delete_for_user_except(&self, user_id: Uuid, keep: Option<&str>) -> StoreResult<u64>;

    async fn delete_expired(&self, now: OffsetDateTime) -> StoreResult<u64>;
}

/// Append-only record of security relevant actions.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(
        &self,
        user_id: Uuid,
        action: AuditAction,
        details: serde_json::Value,
    ) -> StoreResult<()>;
}

/// Read-only view over the nodes and tasks a user owns.
#[async_trait]
pub trait ResourceSummaryStore: Send + Sync {
    async fn summary_for(&self, user_id: Uuid) -> StoreResult<NodeTaskSummary>;
}
