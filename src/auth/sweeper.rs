use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::services::AuthService;

/// Periodically deletes sessions whose expiry has passed.
pub fn spawn(auth: Arc<AuthService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match auth.cleanup_expired_sessions().await {
                Ok(removed) => debug!(removed, "session sweep finished"),
                Err(e) => warn!(error = %e, "session sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::memory::{MemoryStore, Session},
        config::AppConfig,
    };
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn lapsed(user_id: Uuid, token: &str) -> Session {
        let past = OffsetDateTime::now_utc() - time::Duration::hours(1);
        Session {
            id: Uuid::new_v4(),
            user_id,
            token: token.into(),
            expires_at: past,
            last_activity: past,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_start_and_on_every_interval() {
        let store = Arc::new(MemoryStore::default());
        let auth = Arc::new(
            AuthService::new(
                &AppConfig::for_tests(),
                store.clone(),
                store.clone(),
                store.clone(),
            )
            .expect("service"),
        );
        let user_id = Uuid::new_v4();
        store.insert_session(lapsed(user_id, "first")).await;

        let handle = spawn(auth, Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.sessions_for(user_id).await.is_empty());

        store.insert_session(lapsed(user_id, "second")).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.sessions_for(user_id).await.len(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(store.sessions_for(user_id).await.is_empty());
        handle.abort();
    }
}
