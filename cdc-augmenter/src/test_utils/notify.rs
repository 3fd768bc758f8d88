use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Notification registered on a test helper, awaited with a deadline.
#[derive(Debug, Clone)]
pub struct TimedNotify {
    notify: Arc<Notify>,
}

impl TimedNotify {
    pub fn new(notify: Arc<Notify>) -> Self {
        Self { notify }
    }

    /// Waits for the notification. Panics after 30 seconds without one.
    pub async fn notified(&self) {
        if tokio::time::timeout(NOTIFY_TIMEOUT, self.notify.notified())
            .await
            .is_err()
        {
            panic!("no notification within {NOTIFY_TIMEOUT:?}");
        }
    }
}
