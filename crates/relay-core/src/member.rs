//! Public identity of an admitted client.

use crate::client_id::ClientId;

/// The `{id, name}` pair that identifies a client in broadcasts.
///
/// The display name is whatever the peer sent during the handshake;
/// it is neither validated nor deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: ClientId,
    pub name: String,
}

impl Member {
    pub fn new(id: ClientId, name: impl Into<String>) -> Self {
        Member {
            id,
            name: name.into(),
        }
    }
}
