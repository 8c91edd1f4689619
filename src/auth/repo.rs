use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{
    ActiveSession, AuditAction, NewUser, NodeTaskSummary, ProfileUpdate, User, UserProfile,
};
use super::store::{AuditLog, CredentialStore, ResourceSummaryStore, SessionStore, StoreResult};

const USER_COLUMNS: &str = r#"
    id, email, username, password_hash, first_name, last_name, avatar_url,
    is_email_verified, is_premium, max_nodes, max_tasks, login_count,
    last_login, is_active, created_at, updated_at
"#;

/// PostgreSQL backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_user(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.fetch_user("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.fetch_user("username", username).await
    }

    async fn create_user(&self, new: NewUser, now: OffsetDateTime) -> StoreResult<User> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let sql = format!(
            r#"
            INSERT INTO users (id, email, username, password_hash, first_name, last_name,
                               login_count, last_login, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $7, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.email)
            .bind(&new.username)
            .bind(&new.password_hash)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO user_profiles (user_id, updated_at) VALUES ($1, $2)")
            .bind(user.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.context("commit tx")?;
        Ok(user)
    }

    async fn record_login(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET login_count = login_count + 1, last_login = $2, updated_at = $2
             WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(now)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let mut users = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = now()");
        if let Some(v) = &update.first_name {
            users.push(", first_name = ").push_bind(v.clone());
        }
        if let Some(v) = &update.last_name {
            users.push(", last_name = ").push_bind(v.clone());
        }
        if let Some(v) = &update.avatar_url {
            users.push(", avatar_url = ").push_bind(v.clone());
        }
        users.push(" WHERE id = ").push_bind(id);
        users.push(" RETURNING ").push(USER_COLUMNS);
        let user = users
            .build_query_as::<User>()
            .fetch_optional(&mut *tx)
            .await?;

        let Some(user) = user else {
            return Ok(None);
        };

        if update.touches_profile() {
            let mut profile =
                QueryBuilder::<Postgres>::new("UPDATE user_profiles SET updated_at = now()");
            let text_columns = [
                ("bio", &update.bio),
                ("company", &update.company),
                ("location", &update.location),
                ("website", &update.website),
                ("twitter", &update.twitter),
                ("github", &update.github),
                ("linkedin", &update.linkedin),
            ];
            for (column, value) in text_columns {
                if let Some(v) = value {
                    profile.push(", ").push(column).push(" = ").push_bind(v.clone());
                }
            }
            let flag_columns = [
                ("email_digest", update.email_digest),
                ("task_notifications", update.task_notifications),
                ("node_alerts", update.node_alerts),
            ];
            for (column, value) in flag_columns {
                if let Some(v) = value {
                    profile.push(", ").push(column).push(" = ").push_bind(v);
                }
            }
            if let Some(theme) = update.theme {
                profile.push(", theme = ").push_bind(theme.as_str());
            }
            profile.push(" WHERE user_id = ").push_bind(id);
            profile.build().execute(&mut *tx).await?;
        }

        tx.commit().await.context("commit tx")?;
        Ok(Some(user))
    }

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT user_id, bio, company, location, website, twitter, github, linkedin,
                   email_digest, task_notifications, node_alerts, theme, updated_at
              FROM user_profiles
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(profile)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token, expires_at, last_activity, created_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_active(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Option<ActiveSession>> {
        let session = sqlx::query_as::<_, ActiveSession>(
            r#"
            SELECT id, user_id
              FROM sessions
             WHERE token = $1 AND expires_at > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;
        Ok(session)
    }

    async fn touch(&self, id: Uuid, now: OffsetDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE sessions SET last_activity = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete_by_token(&self, token: &str) -> StoreResult<u64> {
        let done = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected())
    }

    async fn delete_for_user_except(&self, user_id: Uuid, keep: Option<&str>) -> StoreResult<u64> {
        let done = sqlx::query(
            r#"
            DELETE FROM sessions
             WHERE user_id = $1
               AND ($2::text IS NULL OR token <> $2)
            "#,
        )
        .bind(user_id)
        .bind(keep)
        .execute(&self.db)
        .await?;
        Ok(done.rows_affected())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let done = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl AuditLog for PgStore {
    async fn record(
        &self,
        user_id: Uuid,
        action: AuditAction,
        details: serde_json::Value,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, details)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(action.as_str())
        .bind(details)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceSummaryStore for PgStore {
    async fn summary_for(&self, user_id: Uuid) -> StoreResult<NodeTaskSummary> {
        let (total_nodes, online_nodes): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status IN ('online', 'idle', 'busy'))
              FROM nodes
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let (total_tasks, running_tasks, completed_tasks, failed_tasks): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COUNT(*) FILTER (WHERE status = 'running'),
                       COUNT(*) FILTER (WHERE status = 'completed'),
                       COUNT(*) FILTER (WHERE status = 'failed')
                  FROM tasks
                 WHERE user_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        Ok(NodeTaskSummary {
            total_nodes,
            online_nodes,
            total_tasks,
            running_tasks,
            completed_tasks,
            failed_tasks,
        })
    }
}
