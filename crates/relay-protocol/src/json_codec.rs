//! JSON envelope codec.
//!
//! Client → server:
//!
//! ```text
//! {"op": "HELLO",          "message": <display name>}
//! {"op": "CREATE_MESSAGE", "message": <content string>}
//! ```
//!
//! Server → client:
//!
//! ```text
//! {"op": "HELLO",       "message": "ALLOWED" | "DISALLOWED"}
//! {"op": "ID_ASSIGN",   "message": <32 hex id>}
//! {"op": "NEW_MEMBER",  "message": {"client": {"id", "name"}}}
//! {"op": "NEW_MESSAGE", "message": {"client": {"id", "name"}, "content"}}
//! ```
//!
//! Decoding is strict: both fields must be present and the payload must
//! match the schema of its op. The server maps every decode error to the
//! same silent-discard path, but the variants stay distinct so callers
//! can log why a frame was dropped.

use relay_core::{ClientId, ClientRequest, HelloStatus, Member, ServerEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::wire_types::{
    op, Envelope, NewMemberPayload, NewMessagePayload, WireClient, HELLO_ALLOWED,
    HELLO_DISALLOWED,
};

/// Errors that can occur while decoding or encoding envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not valid JSON at all.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Valid JSON, but not a JSON object.
    #[error("envelope is not a JSON object")]
    NotAnObject,

    /// A required envelope field is absent.
    #[error("envelope is missing the `{0}` field")]
    MissingField(&'static str),

    /// `op` is present but is not a string.
    #[error("envelope `op` is not a string")]
    InvalidOp,

    /// `op` is a string this side of the protocol does not know.
    #[error("unknown operation `{0}`")]
    UnknownOp(String),

    /// Known op, but its `message` does not fit the schema.
    #[error("invalid `{op}` payload: {reason}")]
    InvalidPayload { op: &'static str, reason: String },
}

impl ProtocolError {
    /// True when the frame was well-formed but carried an op we do not
    /// handle, as opposed to being broken.
    pub fn is_unknown_op(&self) -> bool {
        matches!(self, ProtocolError::UnknownOp(_))
    }
}

// -----------------------------------------------------------------------------
// Client → server
// -----------------------------------------------------------------------------

/// Decode a client frame into a `ClientRequest`.
///
/// The `HELLO` display name is coerced to text: a JSON string is used as
/// is, any other value uses its compact JSON rendering.
pub fn decode_request(text: &str) -> Result<ClientRequest, ProtocolError> {
    let (op_tag, message) = split_envelope(text)?;

    match op_tag.as_str() {
        op::HELLO => {
            let name = match message {
                Value::String(s) => s,
                other => other.to_string(),
            };
            Ok(ClientRequest::Hello { name })
        }
        op::CREATE_MESSAGE => match message {
            Value::String(content) => Ok(ClientRequest::CreateMessage { content }),
            other => Err(ProtocolError::InvalidPayload {
                op: op::CREATE_MESSAGE,
                reason: format!("expected a string, got {}", json_kind(&other)),
            }),
        },
        _ => Err(ProtocolError::UnknownOp(op_tag)),
    }
}

/// Encode a `ClientRequest` as envelope text.
pub fn encode_request(request: &ClientRequest) -> Result<String, ProtocolError> {
    match request {
        ClientRequest::Hello { name } => to_envelope(op::HELLO, name),
        ClientRequest::CreateMessage { content } => to_envelope(op::CREATE_MESSAGE, content),
    }
}

// -----------------------------------------------------------------------------
// Server → client
// -----------------------------------------------------------------------------

/// Encode a `ServerEvent` as envelope text.
pub fn encode_event(event: &ServerEvent) -> Result<String, ProtocolError> {
    match event {
        ServerEvent::Hello(status) => {
            let message = match status {
                HelloStatus::Allowed => HELLO_ALLOWED,
                HelloStatus::Disallowed => HELLO_DISALLOWED,
            };
            to_envelope(op::HELLO, message)
        }
        ServerEvent::IdAssign(id) => to_envelope(op::ID_ASSIGN, id.to_string()),
        ServerEvent::NewMember(member) => to_envelope(
            op::NEW_MEMBER,
            NewMemberPayload {
                client: WireClient::from(member),
            },
        ),
        ServerEvent::NewMessage { from, content } => to_envelope(
            op::NEW_MESSAGE,
            NewMessagePayload {
                client: WireClient::from(from),
                content: content.clone(),
            },
        ),
    }
}

/// Decode a server frame into a `ServerEvent`.
///
/// Used by clients (and tests) to interpret what the relay sends.
pub fn decode_event(text: &str) -> Result<ServerEvent, ProtocolError> {
    let (op_tag, message) = split_envelope(text)?;

    match op_tag.as_str() {
        op::HELLO => match message.as_str() {
            Some(HELLO_ALLOWED) => Ok(ServerEvent::Hello(HelloStatus::Allowed)),
            Some(HELLO_DISALLOWED) => Ok(ServerEvent::Hello(HelloStatus::Disallowed)),
            _ => Err(ProtocolError::InvalidPayload {
                op: op::HELLO,
                reason: format!("unexpected status {}", message),
            }),
        },
        op::ID_ASSIGN => {
            let id = message
                .as_str()
                .ok_or_else(|| ProtocolError::InvalidPayload {
                    op: op::ID_ASSIGN,
                    reason: format!("expected a string, got {}", json_kind(&message)),
                })
                .and_then(|s| parse_id(op::ID_ASSIGN, s))?;
            Ok(ServerEvent::IdAssign(id))
        }
        op::NEW_MEMBER => {
            let payload: NewMemberPayload = from_payload(op::NEW_MEMBER, message)?;
            Ok(ServerEvent::NewMember(to_member(op::NEW_MEMBER, payload.client)?))
        }
        op::NEW_MESSAGE => {
            let payload: NewMessagePayload = from_payload(op::NEW_MESSAGE, message)?;
            Ok(ServerEvent::NewMessage {
                from: to_member(op::NEW_MESSAGE, payload.client)?,
                content: payload.content,
            })
        }
        _ => Err(ProtocolError::UnknownOp(op_tag)),
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

/// Parse `text` as an envelope object and pull out `op` and `message`.
///
/// `message` must be present; an explicit `null` is accepted and left to
/// the per-op schema.
fn split_envelope(text: &str) -> Result<(String, Value), ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let mut object: Map<String, Value> = match value {
        Value::Object(object) => object,
        _ => return Err(ProtocolError::NotAnObject),
    };

    let op_tag = match object.remove("op") {
        Some(Value::String(s)) => s,
        Some(_) => return Err(ProtocolError::InvalidOp),
        None => return Err(ProtocolError::MissingField("op")),
    };
    let message = object
        .remove("message")
        .ok_or(ProtocolError::MissingField("message"))?;

    Ok((op_tag, message))
}

fn to_envelope<T: Serialize>(op_tag: &str, message: T) -> Result<String, ProtocolError> {
    let envelope = Envelope {
        op: op_tag,
        message,
    };
    Ok(serde_json::to_string(&envelope)?)
}

fn from_payload<T: DeserializeOwned>(op_tag: &'static str, message: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(message).map_err(|e| ProtocolError::InvalidPayload {
        op: op_tag,
        reason: e.to_string(),
    })
}

fn to_member(op_tag: &'static str, client: WireClient) -> Result<Member, ProtocolError> {
    let id = parse_id(op_tag, &client.id)?;
    Ok(Member::new(id, client.name))
}

fn parse_id(op_tag: &'static str, s: &str) -> Result<ClientId, ProtocolError> {
    s.parse::<ClientId>().map_err(|e| ProtocolError::InvalidPayload {
        op: op_tag,
        reason: format!("bad client id `{}`: {}", s, e),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
