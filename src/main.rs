mod app;
mod auth;
mod clock;
mod config;
mod error;
mod extract;
mod groups;
mod ingredients;
mod invitations;
mod meal_plans;
mod roles;
mod shopping;
mod state;
mod store;
#[cfg(test)]
mod testing;
mod validation;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "mealplanner=debug,axum=info,tower_http=info".to_string());
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

    if let Some(every) = app_state.config.cleanup_interval() {
        tracing::info!(interval_secs = every.as_secs(), "invitation cleanup scheduled");
        invitations::services::spawn_cleanup_task(app_state.clone(), every);
    }

    let config = app_state.config.clone();
    app::serve(app::build_app(app_state), &config).await
}
