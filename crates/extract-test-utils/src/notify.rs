//! Notification recorder for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use archive_client::{Notification, Notifier};

/// Notifier that records every event for later assertions.
#[derive(Default)]
pub struct CollectingNotifier {
    events: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }

    pub fn retry_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, Notification::Retry { .. }))
            .count()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, event: Notification) {
        self.events.lock().unwrap().push(event);
    }
}
