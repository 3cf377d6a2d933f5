//! Server-assigned client identifiers.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Identifier for an admitted client.
///
/// Always generated by the server (random v4 UUID, 122 bits of
/// entropy) and rendered as 32 lowercase hex characters without
/// dashes. Ids are never taken from the wire, so one client cannot
/// claim another's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Generate a fresh, random id.
    pub fn generate() -> Self {
        ClientId(Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ClientId {
    type Err = uuid::Error;

    /// Accepts the simple (32 hex) form as well as the hyphenated one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ClientId)
    }
}
