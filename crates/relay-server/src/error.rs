//! Error type for the relay server.
//!
//! Protocol outcomes (full registry, bad handshake reply, malformed chat
//! frame, a failed send to one broadcast recipient) are **not** errors;
//! they are handled in place. `RelayError` covers infrastructure
//! failures only.

use relay_core::RegistryError;
use relay_protocol::ProtocolError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Binding or accepting on the listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket upgrade or frame I/O failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// An outbound event could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Registry invariant violation while admitting a client.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
