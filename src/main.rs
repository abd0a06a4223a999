use anyhow::Context;
use taskboard::{auth, build_router, config::Config, notify::Notifier, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(config.log_json);

    let notifier = Notifier::from_config(&config.mail).context("mail transport setup failed")?;
    let state = AppState::new(config, notifier);

    let seeded = auth::seed_users(&state.store, &state.config.seed_users)
        .await
        .context("seeding users failed")?;
    if seeded > 0 {
        info!(seeded, "users added from configuration");
    }

    let addr = state.config.bind;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr} failed"))?;

    info!("Server running at http://{}", addr);
    info!("Static files: {}", state.config.static_dir.display());
    info!("Database:     {}", state.store.path().display());
    info!("API base:     http://{}/api", addr);

    axum::serve(listener, build_router(state))
        .await
        .context("server error")?;
    Ok(())
}
