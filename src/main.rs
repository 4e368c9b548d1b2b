use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use devicelock::{app, build_state, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // -----------------------------
    // Logging
    // -----------------------------
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        store = %config.store_path.display(),
        pinned_fingerprint = config.fingerprint_override.is_some(),
        "starting devicelock"
    );

    // -----------------------------
    // Shared state / Routers
    // -----------------------------
    let state = build_state(&config);
    let router = app(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "HTTP listening");
    info!("login page at http://{}/", config.bind_addr);

    axum::serve(listener, router.into_make_service()).await?;

    Ok(())
}
