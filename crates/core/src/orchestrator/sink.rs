//! Event sink contract.

use tokio::sync::{broadcast, mpsc};

use crate::job::JobEvent;

/// Receives every event the orchestrator produces, in order.
///
/// `emit` is called from the job task and must not block. Delivery failures
/// (a closed channel, no subscribers) are the sink's concern and never
/// affect the job.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

impl EventSink for mpsc::UnboundedSender<JobEvent> {
    fn emit(&self, event: JobEvent) {
        let _ = self.send(event);
    }
}

impl EventSink for broadcast::Sender<JobEvent> {
    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.send(event);
    }
}
