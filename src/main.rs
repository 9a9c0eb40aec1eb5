mod app;
mod auth;
mod config;
mod db;
mod rate_limit;
mod state;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "hostel_auth=debug,axum=info,tower_http=info".to_string());
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

    let app_state = state::AppState::init()?;

    if let Err(e) = sqlx::migrate!("./migrations").run(app_state.db.inner()).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    let purge = app::spawn_limiter_purge(&app_state);
    let db = app_state.db.clone();

    app::serve(app::build_app(app_state)).await?;

    purge.abort();
    db.close().await;
    Ok(())
}
