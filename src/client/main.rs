//! Progress Sync Client Entry Point
//!
//! Runs the sync engine against the configured server and logs its events
//! until interrupted.

use progress_sync::client::config::Config;
use progress_sync::client::session::{session_channel, SessionState};
use progress_sync::client::sync::SyncEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = Config::from_env()?;
    let database_path = config.database_path();
    tracing::info!("[STARTUP] Cache at {}", database_path.display());

    let session = SessionState {
        access_token: std::env::var("ACCESS_TOKEN").ok(),
        user_id: std::env::var("USER_ID").ok(),
    };
    let (_session_tx, session_rx) = session_channel(session);

    let mut app = config.into_app();
    app.database_path = Some(database_path);

    let engine = SyncEngine::connect(app, session_rx).await?;
    engine.start().await?;

    let state = engine.state().await?;
    tracing::info!(
        "[STARTUP] {:?}, {} pending operation(s)",
        state.network_status,
        state.pending_operations
    );

    let mut events = engine.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => tracing::info!("[SYNC] {:?}", event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("[SYNC] Skipped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("[SHUTDOWN] Interrupted");
                break;
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}
