mod app;
mod auth;
mod config;
mod db;
mod error;
mod hub;
mod state;
mod users;
mod validation;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "exoportal=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let (host, port) = (config.host.clone(), config.port);
    let app_state = AppState::init(config).await?;

    auth::sweeper::spawn(
        app_state.auth.clone(),
        app_state.config.session_sweep_interval(),
    );
    app_state
        .hub
        .clone()
        .spawn(app_state.config.hub.poll_interval());
    tracing::info!(hub = %app_state.config.hub.base_url, "background jobs started");

    let app = app::build_app(app_state);
    app::serve(app, &host, port).await
}
