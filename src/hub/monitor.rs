use std::{sync::Arc, time::Duration};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, warn};

use super::client::{HubSource, NodeStatus, TaskStatus};

/// Latest view of the hub. `updated_at` is the last successful refresh.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubSnapshot {
    pub nodes: Vec<NodeStatus>,
    pub tasks: Vec<TaskStatus>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubSummary {
    pub total_nodes: usize,
    pub active_nodes: usize,
    pub total_tasks: usize,
    pub running_tasks: usize,
}

impl HubSnapshot {
    pub fn summary(&self) -> HubSummary {
        HubSummary {
            total_nodes: self.nodes.len(),
            active_nodes: self.nodes.iter().filter(|n| n.is_online()).count(),
            total_tasks: self.tasks.len(),
            running_tasks: self.tasks.iter().filter(|t| t.is_running()).count(),
        }
    }
}

/// Polls a [`HubSource`] and keeps the last good snapshot around.
#[derive(Clone)]
pub struct HubMonitor {
    source: Arc<dyn HubSource>,
    snapshot: Arc<RwLock<HubSnapshot>>,
}

impl HubMonitor {
    pub fn new(source: Arc<dyn HubSource>) -> Self {
        Self {
            source,
            snapshot: Arc::new(RwLock::new(HubSnapshot::default())),
        }
    }

    pub async fn snapshot(&self) -> HubSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Fetches nodes and tasks together. On failure the previous data stays
    /// and only `last_error` changes.
    pub async fn refresh(&self) -> anyhow::Result<()> {
        let fetched = tokio::try_join!(self.source.nodes(), self.source.tasks());
        let mut snap = self.snapshot.write().await;
        match fetched {
            Ok((nodes, tasks)) => {
                debug!(nodes = nodes.len(), tasks = tasks.len(), "hub snapshot refreshed");
                snap.nodes = nodes;
                snap.tasks = tasks;
                snap.updated_at = Some(OffsetDateTime::now_utc());
                snap.last_error = None;
                Ok(())
            }
            Err(e) => {
                snap.last_error = Some(format!("{:#}", e));
                Err(e)
            }
        }
    }

    pub fn spawn(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "hub refresh failed");
                }
            }
        })
    }
}
