//! relay-core
//!
//! Pure relay logic:
//! - client identity (server-assigned ids, display names)
//! - logical client requests / server events
//! - the capacity-bounded registry of admitted clients
//!
//! Nothing in here knows about sockets or JSON.

pub mod client_id;
pub mod member;
pub mod messages;
pub mod registry;
pub mod error;

pub use client_id::ClientId;
pub use member::Member;

pub use messages::{
    ClientRequest,
    HelloStatus,
    ServerEvent,
};

pub use registry::Registry;
pub use error::RegistryError;
