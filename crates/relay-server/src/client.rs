//! Per-connection supervisor.
//!
//! Upgrade → handshake → receive loop → cleanup. Cleanup (registry
//! removal) runs on every exit path: explicitly after the loop, and via
//! the `Departure` guard (armed by the handshake as soon as the client
//! is registered) when the task is aborted or unwinds.
//!
//! No departure event is broadcast; peers only notice a client is gone
//! because it stops appearing in broadcasts.

use std::net::SocketAddr;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use crate::error::RelayError;
use crate::handshake::{perform_handshake, HandshakeOutcome};
use crate::registry::SharedRegistry;
use crate::router;
use crate::types::{Client, WsSource};

/// Run one connection to completion.
pub async fn run_client(
    stream: TcpStream,
    peer: SocketAddr,
    registry: SharedRegistry,
) -> Result<(), RelayError> {
    let ws = accept_async(stream).await?;
    info!(%peer, "connection established");

    let (client, source, departure) = match perform_handshake(ws, peer, &registry).await? {
        HandshakeOutcome::Admitted {
            client,
            source,
            departure,
        } => (client, source, departure),
        HandshakeOutcome::Rejected(reason) => {
            info!(%peer, ?reason, "connection closed during handshake");
            return Ok(());
        }
    };

    receive_loop(&client, source, &registry).await;

    departure.disarm();
    registry.remove(&client.id()).await;
    info!(client_id = %client.id(), %peer, "connection closed");

    Ok(())
}

/// Feed text frames to the router until the connection ends.
async fn receive_loop(client: &Client, mut source: WsSource, registry: &SharedRegistry) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => router::route(client, text.as_str(), registry).await,
            Ok(Message::Close(_)) => break,
            // Binary and control frames are ignored.
            Ok(_) => {}
            Err(e) => {
                debug!(client_id = %client.id(), error = %e, "connection dropped");
                break;
            }
        }
    }
}
