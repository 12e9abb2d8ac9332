//! Event sink that keeps everything it receives.

use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

use crate::job::JobEvent;
use crate::orchestrator::EventSink;

/// Records events in arrival order and lets tests wait for a job to finish.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<JobEvent>>,
    notify: Notify,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far.
    pub fn events(&self) -> Vec<JobEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events belonging to one job.
    pub fn events_for(&self, job_id: &str) -> Vec<JobEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.job_id() == job_id)
            .collect()
    }

    /// Waits until `job_id` produced its terminal event and returns it.
    ///
    /// Returns `None` if it did not arrive within `timeout`.
    pub async fn wait_for_terminal(&self, job_id: &str, timeout: Duration) -> Option<JobEvent> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if let Some(event) = self
                    .events_for(job_id)
                    .into_iter()
                    .find(|e| e.is_terminal())
                {
                    return event;
                }

                notified.await;
            }
        })
        .await
        .ok()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: JobEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        self.notify.notify_waiters();
    }
}
