use std::sync::Arc;

use serde_json::json;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    jwt::{IssuedToken, TokenCodec},
    password::PasswordHasher,
    repo_types::{AuditAction, NewUser, ProfileUpdate, User},
    store::{AuditLog, CredentialStore, SessionStore},
};
use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
};

/// Registration input after validation and trimming.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Result of a successful register or login.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: User,
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// The only component that mutates credentials and sessions.
pub struct AuthService {
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    audit: Arc<dyn AuditLog>,
    codec: TokenCodec,
    hasher: PasswordHasher,
    revoke_other_sessions_on_password_change: bool,
    // Verified against when the email is unknown so both login failures cost the same.
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        config: &AppConfig,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        audit: Arc<dyn AuditLog>,
    ) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::new(config.hashing)?;
        let dummy_hash = hasher.hash(&Uuid::new_v4().to_string())?;
        Ok(Self {
            credentials,
            sessions,
            audit,
            codec: TokenCodec::new(&config.token),
            hasher,
            revoke_other_sessions_on_password_change: config
                .revoke_other_sessions_on_password_change,
            dummy_hash,
        })
    }

    #[cfg(test)]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub async fn register(&self, input: Registration) -> AppResult<AuthOutcome> {
        if self.credentials.find_by_email(&input.email).await?.is_some() {
            warn!(email = %input.email, "email already registered");
            return Err(AppError::Conflict(
                "User with this email already exists".into(),
            ));
        }
        if self
            .credentials
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            warn!(username = %input.username, "username already taken");
            return Err(AppError::Conflict("Username is already taken".into()));
        }

        let password_hash = self.hasher.hash_blocking(input.password).await?;
        let now = OffsetDateTime::now_utc();
        let user = self
            .credentials
            .create_user(
                NewUser {
                    email: input.email,
                    username: input.username,
                    password_hash,
                    first_name: input.first_name,
                    last_name: input.last_name,
                },
                now,
            )
            .await?;

        let issued = self.open_session(user.id, now).await?;
        self.audit(
            user.id,
            AuditAction::Register,
            json!({ "email": user.email, "username": user.username }),
        )
        .await;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(AuthOutcome {
            user,
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthOutcome> {
        let Some(user) = self.credentials.find_by_email(email).await? else {
            // Burn the same verification cost as a real account.
            let _ = self
                .hasher
                .verify_blocking(password.to_string(), self.dummy_hash.clone())
                .await;
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let ok = self
            .hasher
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(user_id = %user.id, "login to deactivated account");
            return Err(AppError::AccountDeactivated);
        }

        let now = OffsetDateTime::now_utc();
        let user = self.credentials.record_login(user.id, now).await?;
        let issued = self.open_session(user.id, now).await?;
        self.audit(user.id, AuditAction::Login, json!({ "email": user.email }))
            .await;

        info!(user_id = %user.id, login_count = user.login_count, "user logged in");
        Ok(AuthOutcome {
            user,
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    /// Idempotent: a token with no session is not an error.
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        let removed = self.sessions.delete_by_token(token).await?;
        if let Some(user_id) = self.codec.verify(token) {
            self.audit(
                user_id,
                AuditAction::Logout,
                json!({ "sessionFound": removed > 0 }),
            )
            .await;
            info!(user_id = %user_id, "user logged out");
        } else {
            debug!(removed, "logout with unverifiable token");
        }
        Ok(())
    }

    /// Resolves a bearer token to its user. Both the signature and a live
    /// session row are required; the session's activity time is refreshed.
    pub async fn get_user_by_token(&self, token: &str) -> AppResult<Option<User>> {
        let Some(user_id) = self.codec.verify(token) else {
            return Ok(None);
        };

        let now = OffsetDateTime::now_utc();
        let Some(session) = self.sessions.find_active(token, now).await? else {
            debug!(user_id = %user_id, "token verified but no live session");
            return Ok(None);
        };
        if session.user_id != user_id {
            warn!(user_id = %user_id, session_user = %session.user_id, "session owner mismatch");
            return Ok(None);
        }

        let Some(user) = self.credentials.find_by_id(user_id).await? else {
            return Ok(None);
        };
        self.sessions.touch(session.id, now).await?;
        Ok(Some(user))
    }

    /// `current_token` is kept alive when other sessions are revoked.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        current_token: Option<&str>,
    ) -> AppResult<()> {
        let user = self
            .credentials
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        let ok = self
            .hasher
            .verify_blocking(current_password.to_string(), user.password_hash.clone())
            .await?;
        if !ok {
            warn!(user_id = %user_id, "change_password with wrong current password");
            return Err(AppError::IncorrectPassword);
        }

        let hash = self.hasher.hash_blocking(new_password.to_string()).await?;
        self.credentials.update_password_hash(user_id, &hash).await?;

        let revoked = if self.revoke_other_sessions_on_password_change {
            self.sessions
                .delete_for_user_except(user_id, current_token)
                .await?
        } else {
            0
        };

        self.audit(
            user_id,
            AuditAction::ChangePassword,
            json!({ "revokedSessions": revoked }),
        )
        .await;
        info!(user_id = %user_id, revoked, "password changed");
        Ok(())
    }

    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<User> {
        let user = self
            .credentials
            .update_profile(user_id, &update)
            .await?
            .ok_or(AppError::NotFound("User"))?;

        let fields = update.changed_fields();
        self.audit(
            user_id,
            AuditAction::UpdateProfile,
            json!({ "fields": fields }),
        )
        .await;
        info!(user_id = %user_id, ?fields, "profile updated");
        Ok(user)
    }

    pub async fn cleanup_expired_sessions(&self) -> AppResult<u64> {
        let removed = self
            .sessions
            .delete_expired(OffsetDateTime::now_utc())
            .await?;
        if removed > 0 {
            info!(removed, "expired sessions removed");
        }
        Ok(removed)
    }

    async fn open_session(&self, user_id: Uuid, now: OffsetDateTime) -> AppResult<IssuedToken> {
        let issued = self.codec.issue(user_id)?;
        self.sessions
            .create(user_id, &issued.token, issued.expires_at, now)
            .await?;
        Ok(issued)
    }

    // Audit writes never fail the action they describe.
    async fn audit(&self, user_id: Uuid, action: AuditAction, details: serde_json::Value) {
        if let Err(e) = self.audit.record(user_id, action, details).await {
            warn!(error = %e, user_id = %user_id, action = action.as_str(), "audit write failed");
        }
    }
}
