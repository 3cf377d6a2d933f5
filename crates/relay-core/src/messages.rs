//! Logical messages exchanged between the relay and its clients.
//!
//! These are **transport-agnostic**:
//! - [`ClientRequest`]: what a client asks the relay to do.
//! - [`ServerEvent`]: what the relay tells its clients.
//!
//! The JSON envelope encoding lives in the `relay-protocol` crate;
//! this module is purely logical.

use crate::client_id::ClientId;
use crate::member::Member;

/// A request sent by a client.
///
/// `Hello` is only meaningful during the handshake; after admission the
/// router ignores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Handshake reply carrying the self-declared display name.
    Hello { name: String },

    /// Post a chat message to everybody.
    CreateMessage { content: String },
}

/// Outcome of the capacity check, sent as the first frame of every
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloStatus {
    Allowed,
    Disallowed,
}

/// An event emitted by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Admission gate result.
    Hello(HelloStatus),

    /// The id the server assigned to this connection.
    IdAssign(ClientId),

    /// A client was admitted. Broadcast to everyone, including the
    /// new member itself.
    NewMember(Member),

    /// A chat message. Broadcast to everyone, including the sender.
    NewMessage { from: Member, content: String },
}

impl ServerEvent {
    pub fn new_message(from: Member, content: impl Into<String>) -> Self {
        ServerEvent::NewMessage {
            from,
            content: content.into(),
        }
    }

    /// Wire operation tag of this event.
    pub fn op(&self) -> &'static str {
        match self {
            ServerEvent::Hello(_) => "HELLO",
            ServerEvent::IdAssign(_) => "ID_ASSIGN",
            ServerEvent::NewMember(_) => "NEW_MEMBER",
            ServerEvent::NewMessage { .. } => "NEW_MESSAGE",
        }
    }
}

impl ClientRequest {
    /// Wire operation tag of this request.
    pub fn op(&self) -> &'static str {
        match self {
            ClientRequest::Hello { .. } => "HELLO",
            ClientRequest::CreateMessage { .. } => "CREATE_MESSAGE",
        }
    }
}
