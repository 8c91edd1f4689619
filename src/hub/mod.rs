use crate::state::AppState;
use axum::Router;

pub mod client;
pub mod handlers;
pub mod monitor;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::dashboard_routes())
}
