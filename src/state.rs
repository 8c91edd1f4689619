use std::sync::Arc;

use crate::{
    auth::{
        repo::PgStore,
        services::AuthService,
        store::{CredentialStore, ResourceSummaryStore},
    },
    config::AppConfig,
    db,
    hub::{client::HubClient, monitor::HubMonitor},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub credentials: Arc<dyn CredentialStore>,
    pub resources: Arc<dyn ResourceSummaryStore>,
    pub hub: HubMonitor,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await?;

        let store = Arc::new(PgStore::new(pool));
        let auth = Arc::new(AuthService::new(
            &config,
            store.clone(),
            store.clone(),
            store.clone(),
        )?);
        let hub = HubMonitor::new(Arc::new(HubClient::new(&config.hub)?));

        Ok(Self {
            config,
            auth,
            credentials: store.clone(),
            resources: store,
            hub,
        })
    }
}

#[cfg(test)]
impl AppState {
    /// State backed by in-memory stores and a canned hub.
    pub fn fake() -> (Self, Arc<crate::auth::memory::MemoryStore>) {
        use crate::auth::memory::MemoryStore;
        use crate::hub::monitor::tests::FakeHub;

        let config = Arc::new(AppConfig::for_tests());
        let store = Arc::new(MemoryStore::default());
        let auth = Arc::new(
            AuthService::new(&config, store.clone(), store.clone(), store.clone())
                .expect("auth service"),
        );
        let state = Self {
            config,
            auth,
            credentials: store.clone(),
            resources: store.clone(),
            hub: HubMonitor::new(Arc::new(FakeHub::default())),
        };
        (state, store)
    }
}
