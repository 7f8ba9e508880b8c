use std::sync::Arc;
use std::time::Duration;

mod accounts;
mod app;
mod auth;
mod config;
mod imports;
mod spreadsheet;
mod state;

const RESULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "admin_users_import=debug,axum=info,tower_http=info".to_string());
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

    let app_state = state::AppState::init().await?;
    let results = Arc::clone(&app_state.results);
    let sweeper = results.spawn_sweeper(RESULT_SWEEP_INTERVAL);
    tracing::info!(
        ttl_secs = results.ttl().whole_seconds(),
        "import results sweeper started"
    );

    let app = app::build_app(app_state);
    let served = app::serve(app, results).await;
    sweeper.abort();
    served
}
