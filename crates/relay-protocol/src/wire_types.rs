//! Wire-level constants and payload structs.
//!
//! Every frame is one JSON object `{"op": <string>, "message": <any>}`.
//! The structs here describe the `message` part for ops whose payload is
//! an object; string payloads are handled directly by the codec.

use relay_core::Member;
use serde::{Deserialize, Serialize};

/// Operation tags.
pub mod op {
    pub const HELLO: &str = "HELLO";
    pub const ID_ASSIGN: &str = "ID_ASSIGN";
    pub const NEW_MEMBER: &str = "NEW_MEMBER";
    pub const NEW_MESSAGE: &str = "NEW_MESSAGE";
    pub const CREATE_MESSAGE: &str = "CREATE_MESSAGE";
}

/// `message` values of a server `HELLO`.
pub const HELLO_ALLOWED: &str = "ALLOWED";
pub const HELLO_DISALLOWED: &str = "DISALLOWED";

/// Outbound envelope. Field order (`op` first) is what peers see.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T> {
    pub op: &'a str,
    pub message: T,
}

/// `{id, name}` as it appears inside broadcast payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireClient {
    pub id: String,
    pub name: String,
}

impl From<&Member> for WireClient {
    fn from(member: &Member) -> Self {
        WireClient {
            id: member.id.to_string(),
            name: member.name.clone(),
        }
    }
}

/// `NEW_MEMBER` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMemberPayload {
    pub client: WireClient,
}

/// `NEW_MESSAGE` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessagePayload {
    pub client: WireClient,
    pub content: String,
}
