use deathgame::{DeathGameError, DeathGameServer, ServerConfig, logging};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), DeathGameError> {
    logging::init();

    let config = ServerConfig::from_env()?;
    info!(
        bind = %config.bind_addr,
        round_secs = config.room.round_time_limit.as_secs(),
        results_delay_secs = config.room.results_delay.as_secs(),
        "starting"
    );

    let server = DeathGameServer::builder().config(config).build().await?;
    server.run_until(shutdown_signal()).await
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM, Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received");
}
