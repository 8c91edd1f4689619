//! In-memory stores used by unit and router tests.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo_types::{
    ActiveSession, AuditAction, NewUser, NodeTaskSummary, ProfileUpdate, User, UserProfile,
};
use super::store::{AuditLog, CredentialStore, ResourceSummaryStore, SessionStore, StoreResult};
use crate::error::StoreError;

/// Full session row as kept in memory.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub last_activity: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Uuid,
    pub action: AuditAction,
    pub details: serde_json::Value,
}

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    profiles: RwLock<HashMap<Uuid, UserProfile>>,
    sessions: RwLock<Vec<Session>>,
    audit: RwLock<Vec<AuditEntry>>,
    summaries: RwLock<HashMap<Uuid, NodeTaskSummary>>,
    sessions_down: AtomicBool,
}

impl MemoryStore {
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.read().await.clone()
    }

    pub async fn sessions_for(&self, user_id: Uuid) -> Vec<Session> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn insert_session(&self, session: Session) {
        self.sessions.write().await.push(session);
    }

    pub async fn set_active(&self, user_id: Uuid, active: bool) {
        if let Some(u) = self.users.write().await.iter_mut().find(|u| u.id == user_id) {
            u.is_active = active;
        }
    }

    /// Makes session deletes fail as if the backend were unreachable.
    pub fn fail_session_deletes(&self, on: bool) {
        self.sessions_down.store(on, Ordering::SeqCst);
    }

    pub async fn set_summary(&self, user_id: Uuid, summary: NodeTaskSummary) {
        self.summaries.write().await.insert(user_id, summary);
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, new: NewUser, now: OffsetDateTime) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::Duplicate("users_email_key".into()));
        }
        if users.iter().any(|u| u.username == new.username) {
            return Err(StoreError::Duplicate("users_username_key".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            avatar_url: None,
            is_email_verified: false,
            is_premium: false,
            max_nodes: 5,
            max_tasks: 100,
            login_count: 1,
            last_login: Some(now),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        self.profiles
            .write()
            .await
            .insert(user.id, UserProfile::empty(user.id, now));
        Ok(user)
    }

    async fn record_login(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<User> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("no user {}", id)))?;
        user.login_count += 1;
        user.last_login = Some(now);
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> StoreResult<()> {
        if let Some(u) = self.users.write().await.iter_mut().find(|u| u.id == id) {
            u.password_hash = hash.to_string();
        }
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        update.apply_to_user(user);
        if let Some(profile) = self.profiles.write().await.get_mut(&id) {
            update.apply_to_profile(profile);
        }
        Ok(Some(user.clone()))
    }

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> StoreResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.iter().any(|s| s.token == token) {
            return Err(StoreError::Duplicate("sessions_token_key".into()));
        }
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            token: token.to_string(),
            expires_at,
            last_activity: now,
        };
        sessions.push(session);
        Ok(())
    }

    async fn find_active(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<ActiveSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .iter()
            .find(|s| s.token == token && s.expires_at > now)
            .map(|s| ActiveSession {
                id: s.id,
                user_id: s.user_id,
            }))
    }

    async fn touch(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<()> {
        if let Some(s) = self.sessions.write().await.iter_mut().find(|s| s.id == id) {
            s.last_activity = now;
        }
        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> StoreResult<u64> {
        if self.sessions_down.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("session store unavailable")));
        }
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| s.token != token);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_for_user_except(&self, user_id: Uuid, keep: Option<&str>) -> StoreResult<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| s.user_id != user_id || Some(s.token.as_str()) == keep);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn record(
        &self,
        user_id: Uuid,
        action: AuditAction,
        details: serde_json::Value,
    ) -> StoreResult<()> {
        self.audit.write().await.push(AuditEntry {
            user_id,
            action,
            details,
        });
        Ok(())
    }
}

#[async_trait]
impl ResourceSummaryStore for MemoryStore {
    async fn summary_for(&self, user_id: Uuid) -> StoreResult<NodeTaskSummary> {
        Ok(self
            .summaries
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[tokio::test]
    async fn find_active_skips_expired_rows() {
        let store = MemoryStore::default();
        let user_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        store
            .create(user_id, "live", now + Duration::hours(1), now)
            .await
            .unwrap();
        store
            .create(user_id, "stale", now - Duration::seconds(1), now)
            .await
            .unwrap();

        let live = store.find_active("live", now).await.unwrap().expect("live row");
        assert_eq!(live.user_id, user_id);
        assert_eq!(store.sessions_for(user_id).await[0].id, live.id);
        assert!(store.find_active("stale", now).await.unwrap().is_none());
        assert!(store.find_active("missing", now).await.unwrap().is_none());
    }
}
