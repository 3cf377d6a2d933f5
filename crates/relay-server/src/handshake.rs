//! Admission handshake.
//!
//! ```text
//! ACCEPTED -> CAPACITY_CHECKED -> AWAITING_HELLO -> ADMITTED
//!        \              \                 \
//!         +--------------+-----------------+--> REJECTED
//! ```
//!
//! 1. Reserve a registry slot. No slot: send `HELLO/DISALLOWED`, close.
//! 2. Send `HELLO/ALLOWED`, wait for exactly one reply.
//! 3. Reply must be a text `HELLO` envelope, otherwise close silently.
//! 4. Assign a fresh id, send `ID_ASSIGN`, register the client.
//! 5. Broadcast `NEW_MEMBER` to everyone, the new client included.
//!
//! The wait in step 2 has no timeout; a silent peer keeps its slot
//! until it disconnects.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use relay_core::{ClientId, ClientRequest, HelloStatus, Member, ServerEvent};
use relay_protocol::{decode_request, encode_event, ProtocolError};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use crate::broadcast::broadcast;
use crate::error::RelayError;
use crate::registry::{Departure, SharedRegistry};
use crate::types::{Client, WsSource, WsStream};

/// Why a connection was not admitted.
#[derive(Debug)]
pub enum Rejection {
    /// Registry was full.
    Full,

    /// Peer closed (or sent a close frame) instead of replying.
    NoReply,

    /// First frame was binary rather than text.
    NotText,

    /// Reply could not be decoded.
    BadReply(ProtocolError),

    /// Reply decoded to something other than `HELLO`.
    UnexpectedOp(&'static str),
}

/// Result of a completed handshake.
pub enum HandshakeOutcome {
    /// Client is registered; the read half goes back to the supervisor.
    Admitted {
        client: Arc<Client>,
        source: WsSource,
        departure: Departure,
    },

    /// Connection was closed and nothing was registered.
    Rejected(Rejection),
}

/// Run the handshake on a freshly upgraded connection.
pub async fn perform_handshake(
    mut ws: WsStream,
    peer: SocketAddr,
    registry: &SharedRegistry,
) -> Result<HandshakeOutcome, RelayError> {
    if !registry.try_reserve().await {
        info!(%peer, "registry full, refusing connection");
        send_event(&mut ws, &ServerEvent::Hello(HelloStatus::Disallowed)).await?;
        close_quietly(&mut ws, peer).await;
        return Ok(HandshakeOutcome::Rejected(Rejection::Full));
    }

    let (id, name) = match negotiate(&mut ws).await {
        Ok(Ok(admitted)) => admitted,
        Ok(Err(rejection)) => {
            registry.release().await;
            close_quietly(&mut ws, peer).await;
            return Ok(HandshakeOutcome::Rejected(rejection));
        }
        Err(e) => {
            registry.release().await;
            return Err(e);
        }
    };

    let (sink, source) = ws.split();
    let client = Arc::new(Client::new(Member::new(id, name), peer, sink));

    if let Err(e) = registry.add(Arc::clone(&client)).await {
        registry.release().await;
        return Err(e.into());
    }
    // Registered from here on: cancellation must not leave it behind.
    let departure = registry.departure(id);
    info!(client_id = %id, name = client.name(), %peer, "client admitted");

    broadcast(registry, &ServerEvent::NewMember(client.member().clone())).await;

    Ok(HandshakeOutcome::Admitted {
        client,
        source,
        departure,
    })
}

/// Steps 2–4 up to (not including) registration.
///
/// The outer `Result` carries transport failures, the inner one a
/// protocol-level refusal.
async fn negotiate(ws: &mut WsStream) -> Result<Result<(ClientId, String), Rejection>, RelayError> {
    send_event(ws, &ServerEvent::Hello(HelloStatus::Allowed)).await?;

    let text = loop {
        match ws.next().await {
            None => return Ok(Err(Rejection::NoReply)),
            Some(Err(e)) => return Err(e.into()),
            Some(Ok(Message::Text(text))) => break text,
            // Control frames are not replies.
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) => return Ok(Err(Rejection::NoReply)),
            Some(Ok(_)) => return Ok(Err(Rejection::NotText)),
        }
    };

    let name = match decode_request(text.as_str()) {
        Ok(ClientRequest::Hello { name }) => name,
        Ok(other) => return Ok(Err(Rejection::UnexpectedOp(other.op()))),
        Err(e) => return Ok(Err(Rejection::BadReply(e))),
    };

    let id = ClientId::generate();
    send_event(ws, &ServerEvent::IdAssign(id)).await?;

    Ok(Ok((id, name)))
}

async fn send_event(ws: &mut WsStream, event: &ServerEvent) -> Result<(), RelayError> {
    let text = encode_event(event)?;
    ws.send(Message::text(text)).await?;
    Ok(())
}

async fn close_quietly(ws: &mut WsStream, peer: SocketAddr) {
    if let Err(e) = ws.close(None).await {
        debug!(%peer, error = %e, "error while closing rejected connection");
    }
}
