//! Error types for the relay core.
//!
//! Most registry outcomes are not errors: a full registry is reported
//! by `try_reserve` returning `false`, and removing an absent client is
//! a no-op. Only genuine invariant violations surface here.

use thiserror::Error;

use crate::client_id::ClientId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A client with this id is already registered.
    #[error("client {0} is already registered")]
    DuplicateId(ClientId),

    /// `add` was called without a prior successful `try_reserve`.
    #[error("no admission slot was reserved for client {0}")]
    NotReserved(ClientId),
}
