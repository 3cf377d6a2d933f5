//! WebSocket listener and top-level server wiring.
//!
//! This module:
//! - Binds the loopback address from `Config`.
//! - Accepts new TCP connections.
//! - Spawns one supervisor task per connection (see `client`).
//! - On shutdown: stops accepting, aborts connection tasks, closes
//!   admitted clients (bounded wait) and clears the registry.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use futures::future::join_all;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::client;
use crate::config::Config;
use crate::error::RelayError;
use crate::registry::SharedRegistry;
use crate::types::Client;

/// How long shutdown waits for each client's close frame to go out.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A bound, not yet serving, relay server.
pub struct Server {
    listener: TcpListener,
    registry: SharedRegistry,
}

impl Server {
    /// Bind the listener. Nothing is accepted until `serve_until`.
    pub async fn bind(config: Config) -> Result<Self, RelayError> {
        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr).await?;
        info!(
            addr = %listener.local_addr()?,
            max_clients = config.max_clients,
            "server initialized, waiting for clients"
        );

        Ok(Server {
            listener,
            registry: SharedRegistry::new(config.max_clients),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the registry shared with every connection task.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Accept connections until `shutdown` resolves, then shut down in
    /// order.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()> + Send,
    {
        let Server { listener, registry } = self;
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down server");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };

                    let registry = registry.clone();
                    connections.spawn(async move {
                        if let Err(e) = client::run_client(stream, peer, registry).await {
                            warn!(%peer, error = %e, "connection failed");
                        }
                    });
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "connection task panicked");
                        }
                    }
                }
            }
        }

        drop(listener);

        // Abort connection tasks before closing: a send stuck on a peer
        // that stopped reading holds that peer's sink lock until its
        // future is dropped.
        let members = registry.snapshot().await;
        connections.shutdown().await;
        join_all(members.iter().map(|c| close_with_timeout(c))).await;
        registry.clear().await;

        info!("server has successfully shut down");
        Ok(())
    }
}

async fn close_with_timeout(client: &Client) {
    match timeout(CLOSE_TIMEOUT, client.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(client_id = %client.id(), error = %e, "error while closing client"),
        Err(_) => warn!(client_id = %client.id(), peer = %client.peer(), "timed out closing client"),
    }
}

/// Run the server with the given configuration until Ctrl-C.
pub async fn run(config: Config) -> Result<(), RelayError> {
    let server = Server::bind(config).await?;
    server.serve_until(ctrl_c()).await
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("keyboard interrupt encountered"),
        Err(e) => {
            error!(error = %e, "unable to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
