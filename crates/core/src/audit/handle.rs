use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use super::{AuditEvent, AuditRecord};
use crate::clock::Clock;

/// Handle for emitting audit events
///
/// Cheap to clone. Records are stamped with the handle's clock and travel
/// over a bounded channel to the [`AuditWriter`](super::AuditWriter).
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditRecord>,
    clock: Arc<dyn Clock>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditRecord>, clock: Arc<dyn Clock>) -> Self {
        Self { tx, clock }
    }

    /// Emit an event, waiting for channel capacity. A stopped writer drops the event.
    pub async fn emit(&self, event: AuditEvent) {
        let record = AuditRecord::new(self.clock.now(), event);
        if let Err(e) = self.tx.send(record).await {
            warn!(kind = %e.0.kind, "Audit writer stopped, event dropped");
        }
    }
}
