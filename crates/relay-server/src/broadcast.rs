//! Event fan-out to every registered client.
//!
//! The event is serialized once, a registry snapshot is taken, and one
//! send per recipient is issued concurrently. All sends are joined
//! before returning; a failing recipient is logged and counted but
//! never fails the batch.

use futures::future::join_all;
use relay_core::ServerEvent;
use relay_protocol::encode_event;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::registry::SharedRegistry;

/// Per-broadcast delivery summary.
///
/// "Delivered" means handed to the transport, not acknowledged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Send `event` to every client registered at call time.
pub async fn broadcast(registry: &SharedRegistry, event: &ServerEvent) -> BroadcastReport {
    let text = match encode_event(event) {
        Ok(text) => text,
        Err(e) => {
            warn!(op = event.op(), error = %e, "failed to encode event");
            return BroadcastReport::default();
        }
    };
    let frame = Message::text(text);

    // Snapshot first so the lock is released before any I/O.
    let recipients = registry.snapshot().await;

    let sends = recipients.iter().map(|client| {
        let frame = frame.clone();
        async move {
            match client.send(frame).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        client_id = %client.id(),
                        peer = %client.peer(),
                        op = event.op(),
                        error = %e,
                        "failed to deliver event"
                    );
                    false
                }
            }
        }
    });
    let outcomes = join_all(sends).await;

    let delivered = outcomes.iter().filter(|ok| **ok).count();
    let report = BroadcastReport {
        recipients: outcomes.len(),
        delivered,
        failed: outcomes.len() - delivered,
    };

    debug!(
        op = event.op(),
        recipients = report.recipients,
        failed = report.failed,
        "broadcast event"
    );
    report
}
