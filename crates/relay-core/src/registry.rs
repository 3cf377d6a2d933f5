//! Capacity-bounded registry of admitted clients.
//!
//! Admission is two-phase:
//!
//! 1. [`Registry::try_reserve`] claims a slot while the handshake is
//!    still in flight,
//! 2. [`Registry::add`] turns that slot into a member, or
//!    [`Registry::release`] hands it back if the handshake fails.
//!
//! Reserved slots count against the capacity, so two concurrent
//! handshakes can never both pass the capacity check and then both
//! insert past `max_clients`.
//!
//! The registry itself is not synchronized; the server wraps it in a
//! lock and that lock is the single synchronization point.

use indexmap::IndexMap;

use crate::client_id::ClientId;
use crate::error::RegistryError;

/// Registry of admitted clients, keyed by `ClientId`.
///
/// `H` is whatever handle the caller keeps per client (the server uses
/// `Arc<Client>`). Iteration order is admission order.
#[derive(Debug)]
pub struct Registry<H> {
    max_clients: usize,
    reserved: usize,
    members: IndexMap<ClientId, H>,
}

impl<H> Registry<H> {
    /// Create an empty registry admitting at most `max_clients` clients.
    pub fn new(max_clients: usize) -> Self {
        Registry {
            max_clients,
            reserved: 0,
            members: IndexMap::new(),
        }
    }

    /// Reserve room for one more client.
    ///
    /// Returns `false` (and changes nothing) when admitted members plus
    /// outstanding reservations already reach the capacity.
    pub fn try_reserve(&mut self) -> bool {
        if self.occupied() >= self.max_clients {
            return false;
        }
        self.reserved += 1;
        true
    }

    /// Give back a slot taken by `try_reserve` whose handshake failed.
    pub fn release(&mut self) {
        self.reserved = self.reserved.saturating_sub(1);
    }

    /// Insert a fully constructed client, consuming one reservation.
    pub fn add(&mut self, id: ClientId, handle: H) -> Result<(), RegistryError> {
        if self.reserved == 0 {
            return Err(RegistryError::NotReserved(id));
        }
        if self.members.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }

        self.reserved -= 1;
        self.members.insert(id, handle);
        Ok(())
    }

    /// Remove a client. Removing an absent client is a no-op and
    /// returns `None`.
    pub fn remove(&mut self, id: &ClientId) -> Option<H> {
        // shift_remove keeps the remaining members in admission order.
        self.members.shift_remove(id)
    }

    pub fn get(&self, id: &ClientId) -> Option<&H> {
        self.members.get(id)
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.members.contains_key(id)
    }

    /// Drop every member and every outstanding reservation.
    pub fn clear(&mut self) {
        self.members.clear();
        self.reserved = 0;
    }

    /// Number of admitted members (reservations excluded).
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of handshakes currently holding a slot.
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    pub fn capacity(&self) -> usize {
        self.max_clients
    }

    /// True when no further reservation can succeed.
    pub fn is_full(&self) -> bool {
        self.occupied() >= self.max_clients
    }

    /// Ids of all members in admission order.
    pub fn ids(&self) -> Vec<ClientId> {
        self.members.keys().copied().collect()
    }

    fn occupied(&self) -> usize {
        self.members.len() + self.reserved
    }
}

impl<H: Clone> Registry<H> {
    /// Point-in-time copy of every member handle, in admission order.
    ///
    /// The copy is detached from the registry, so callers can iterate it
    /// (and await on each entry) after releasing the lock.
    pub fn snapshot(&self) -> Vec<H> {
        self.members.values().cloned().collect()
    }
}
