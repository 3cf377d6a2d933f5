//! Shared, lock-guarded client registry.
//!
//! Wraps `relay_core::Registry` in an `Arc<RwLock<..>>` so every
//! connection task can hold a cheap clone. The lock is only ever held
//! for in-memory bookkeeping, never across network I/O.

use std::sync::Arc;

use relay_core::{ClientId, Registry, RegistryError};
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::types::Client;

#[derive(Clone)]
pub struct SharedRegistry {
    inner: Arc<RwLock<Registry<Arc<Client>>>>,
}

impl SharedRegistry {
    pub fn new(max_clients: usize) -> Self {
        SharedRegistry {
            inner: Arc::new(RwLock::new(Registry::new(max_clients))),
        }
    }

    /// Capacity check + slot reservation in one atomic step.
    pub async fn try_reserve(&self) -> bool {
        self.inner.write().await.try_reserve()
    }

    /// Return a reserved slot after a failed handshake.
    pub async fn release(&self) {
        self.inner.write().await.release();
    }

    pub async fn add(&self, client: Arc<Client>) -> Result<(), RegistryError> {
        let id = client.id();
        let mut guard = self.inner.write().await;
        guard.add(id, client)?;
        debug!(client_id = %id, members = guard.len(), "client registered");
        Ok(())
    }

    /// Remove a client. A client that is already gone (racing close
    /// paths) is logged and otherwise ignored.
    pub async fn remove(&self, id: &ClientId) -> Option<Arc<Client>> {
        let removed = self.inner.write().await.remove(id);
        if removed.is_none() {
            warn!(client_id = %id, "connection anomaly: client was not registered");
        }
        removed
    }

    /// Guard that removes `id` when dropped unless disarmed.
    pub fn departure(&self, id: ClientId) -> Departure {
        Departure {
            registry: self.clone(),
            id,
            armed: true,
        }
    }

    /// Removal usable from `Drop`, where awaiting is impossible.
    ///
    /// Removes in place when the lock is free, otherwise schedules the
    /// removal on the current runtime.
    pub fn remove_detached(&self, id: ClientId) {
        if let Ok(mut guard) = self.inner.try_write() {
            guard.remove(&id);
            return;
        }
        if let Ok(handle) = Handle::try_current() {
            let registry = self.clone();
            handle.spawn(async move {
                registry.inner.write().await.remove(&id);
            });
        }
    }

    /// Point-in-time copy of all members, in admission order.
    pub async fn snapshot(&self) -> Vec<Arc<Client>> {
        self.inner.read().await.snapshot()
    }

    pub async fn contains(&self, id: &ClientId) -> bool {
        self.inner.read().await.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Handshakes currently holding a slot.
    pub async fn reserved(&self) -> usize {
        self.inner.read().await.reserved()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

/// Removes a registered client if its task ends without reaching the
/// normal cleanup (abort, panic).
pub struct Departure {
    registry: SharedRegistry,
    id: ClientId,
    armed: bool,
}

impl Departure {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The caller has removed (or is about to remove) the client itself.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Departure {
    fn drop(&mut self) {
        if self.armed {
            self.registry.remove_detached(self.id);
        }
    }
}
