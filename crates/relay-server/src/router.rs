//! Post-admission operation routing.
//!
//! Every text frame from an admitted client is decoded into a
//! `ClientRequest` and matched explicitly. Anything that is not a
//! well-formed `CREATE_MESSAGE` is dropped without a reply and without
//! closing the connection; the debug log records which kind of drop it
//! was.

use relay_core::{ClientRequest, ServerEvent};
use relay_protocol::{decode_request, ProtocolError};
use tracing::debug;

use crate::broadcast::broadcast;
use crate::registry::SharedRegistry;
use crate::types::Client;

/// Route one inbound payload. Delivery failures are logged by
/// `broadcast` and never reach the sender.
pub async fn route(client: &Client, payload: &str, registry: &SharedRegistry) {
    match decode_request(payload) {
        Ok(ClientRequest::CreateMessage { content }) => create_message(client, content, registry).await,
        Ok(ClientRequest::Hello { .. }) => {
            debug!(client_id = %client.id(), reason = "unexpected", op = "HELLO", "discarding frame");
        }
        Err(e) => {
            debug!(client_id = %client.id(), reason = discard_reason(&e), error = %e, "discarding frame");
        }
    }
}

/// `CREATE_MESSAGE` handler: relay the content to everyone, sender
/// included.
async fn create_message(client: &Client, content: String, registry: &SharedRegistry) {
    let event = ServerEvent::new_message(client.member().clone(), content);
    broadcast(registry, &event).await;
}

fn discard_reason(e: &ProtocolError) -> &'static str {
    match e {
        ProtocolError::UnknownOp(_) => "unknown operation",
        ProtocolError::InvalidPayload { .. } => "invalid payload",
        _ => "malformed",
    }
}
