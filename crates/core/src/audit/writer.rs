use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use super::{AuditHandle, AuditRecord, AuditStore};
use crate::clock::Clock;

/// Most records written in one transaction
const MAX_BATCH: usize = 64;

/// Background task that drains emitted records into storage in batches
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditRecord>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    pub fn new(rx: mpsc::Receiver<AuditRecord>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Consume records until every handle has been dropped.
    ///
    /// Whatever is queued when a batch starts is written together, so a burst
    /// of queue moves costs one transaction instead of one per event.
    pub async fn run(mut self) {
        info!("Audit writer started");

        let mut batch = Vec::with_capacity(MAX_BATCH);
        while self.rx.recv_many(&mut batch, MAX_BATCH).await > 0 {
            if let Err(e) = self.store.append(&batch) {
                error!(count = batch.len(), error = %e, "Failed to write audit events");
            }
            batch.clear();
        }

        info!("Audit writer shutting down");
    }
}

/// Create a complete audit system
///
/// Returns the handle to clone across components and the writer to spawn
/// with `tokio::spawn(writer.run())`.
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    clock: Arc<dyn Clock>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = AuditHandle::new(tx, clock);
    let writer = AuditWriter::new(rx, store);
    (handle, writer)
}
