//! relay-protocol
//!
//! Wire-level encoding/decoding for the message relay.
//!
//! This crate turns logical relay messages
//! (`relay_core::ClientRequest` / `ServerEvent`) into JSON envelope
//! text and back again.
//!
//! - [`wire_types`] : serde structs mirroring the envelope payloads
//! - [`json_codec`] : encode/decode functions and [`ProtocolError`]

pub mod wire_types;
pub mod json_codec;

pub use json_codec::{
    ProtocolError,
    decode_event,
    decode_request,
    encode_event,
    encode_request,
};
