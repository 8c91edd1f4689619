use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use super::monitor::{HubSnapshot, HubSummary};
use crate::{auth::extractors::OptionalAuthUser, state::AppState};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard/status", get(dashboard_status))
}

/// Limits of the signed-in viewer, shown next to the cluster view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerQuota {
    pub username: String,
    pub is_premium: bool,
    pub max_nodes: i32,
    pub max_tasks: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub snapshot: HubSnapshot,
    pub summary: HubSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<ViewerQuota>,
}

#[instrument(skip_all)]
pub async fn dashboard_status(
    State(state): State<AppState>,
    OptionalAuthUser(viewer): OptionalAuthUser,
) -> Json<DashboardResponse> {
    let snapshot = state.hub.snapshot().await;
    let summary = snapshot.summary();
    let viewer = viewer.map(|v| ViewerQuota {
        username: v.user.username,
        is_premium: v.user.is_premium,
        max_nodes: v.user.max_nodes,
        max_tasks: v.user.max_tasks,
    });
    Json(DashboardResponse {
        snapshot,
        summary,
        viewer,
    })
}
