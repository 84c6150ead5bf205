mod accounts;
mod app;
mod auth;
mod config;
mod db;
mod state;

use anyhow::Context;

use crate::{config::AppConfig, db::Database, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "chatdesk=debug,axum=info,tower_http=info".to_string());
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

    let config = AppConfig::from_env().context("load configuration")?;
    let db = Database::connect(&config.db).await?;

    db::MIGRATOR
        .run(db.pool())
        .await
        .context("run migrations")?;

    let app_state = AppState::init(&config, db.clone())?;
    let app = app::build_app(app_state, config.cors_allowed_origin.as_deref())?;

    let served = app::serve(app).await;
    db.shutdown().await;
    served?;

    tracing::info!("server shut down");
    Ok(())
}
