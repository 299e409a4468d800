//! `DeathGameServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → rooms. Every accepted
//! connection gets its own handler task; rooms run as their own actors
//! inside the shared [`RoomRegistry`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use deathgame_protocol::{Codec, JsonCodec};
use deathgame_room::{RoomConfig, RoomRegistry};
use deathgame_transport::{Connection, PendingConnection, Transport, WebSocketTransport};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::DeathGameError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: RoomRegistry,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a server.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), deathgame::DeathGameError> {
/// use std::time::Duration;
/// use deathgame::DeathGameServer;
///
/// let server = DeathGameServer::builder()
///     .bind("0.0.0.0:8080")
///     .round_time_limit(Duration::from_secs(20))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeathGameServerBuilder {
    config: ServerConfig,
}

impl DeathGameServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration, e.g. one read by
    /// [`ServerConfig::from_env`].
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    pub fn round_time_limit(mut self, limit: Duration) -> Self {
        self.config.room.round_time_limit = limit;
        self
    }

    pub fn results_delay(mut self, delay: Duration) -> Self {
        self.config.room.results_delay = delay;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Binds the listener. Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<DeathGameServer, DeathGameError> {
        let config = self.config;
        let transport = WebSocketTransport::bind(&config.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: RoomRegistry::new(config.room),
            codec: JsonCodec,
            idle_timeout: config.idle_timeout,
        });

        Ok(DeathGameServer {
            transport,
            state,
            sweep_interval: config.sweep_interval,
        })
    }
}

/// A bound server. Call [`run`](Self::run) to start accepting players.
pub struct DeathGameServer {
    transport: WebSocketTransport,
    state: Arc<ServerState<JsonCodec>>,
    sweep_interval: Duration,
}

impl DeathGameServer {
    pub fn builder() -> DeathGameServerBuilder {
        DeathGameServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The server's rooms. Clones share state with the running server.
    pub fn registry(&self) -> RoomRegistry {
        self.state.registry.clone()
    }

    /// Accepts connections until the process is terminated.
    pub async fn run(self) -> Result<(), DeathGameError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves, then stops every
    /// room.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), DeathGameError> {
        info!(
            addr = ?self.local_addr().ok(),
            "Death Game server running"
        );
        let sweeper = spawn_sweeper(self.state.registry.clone(), self.sweep_interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let peer = pending.peer_addr();
                            let conn = match pending.establish().await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    debug!(%peer, error = %e, "dropped connection during handshake");
                                    return;
                                }
                            };
                            let conn_id = conn.id();
                            if let Err(e) = handle_connection(conn, state).await {
                                debug!(%conn_id, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => {
                    info!("shutting down");
                    break;
                }
            }
        }

        sweeper.abort();
        self.state.registry.shutdown_all().await;
        Ok(())
    }
}

/// Periodically forgets rooms whose actors have stopped.
fn spawn_sweeper(registry: RoomRegistry, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = registry.sweep().await;
            if removed > 0 {
                info!(removed, "disposed rooms swept");
            }
        }
    })
}
