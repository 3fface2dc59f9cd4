//! Livedesk service entry point.

use tracing::info;
use tracing_subscriber::EnvFilter;

use livedesk::app::{self, AppState};
use livedesk::config::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("livedesk=info,mongodb=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting Livedesk...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let state = AppState::bootstrap(&config).await?;
    info!("Application state ready");

    app::run(state).await
}
