//! Process runtime - runs until Ctrl-C, logging setting changes.

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::AppState;

/// Run until a shutdown signal arrives, then close the database client.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let mut changes = state.settings.subscribe();

    let watcher = tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => info!(
                    "Setting {} {:?}: {} -> {}",
                    change.key,
                    change.kind,
                    change
                        .previous
                        .as_ref()
                        .map_or_else(|| "-".to_string(), ToString::to_string),
                    change.value
                ),
                Err(RecvError::Lagged(missed)) => warn!("Setting change log skipped {} events", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("Livedesk is running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    watcher.abort();
    state.db.client().clone().shutdown().await;
    Ok(())
}
