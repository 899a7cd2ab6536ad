//! "New data may be available" notifications for polled requests.

use tokio::sync::broadcast;

/// Default number of undelivered notifications kept per subscriber.
pub const NOTIFY_CAPACITY: usize = 64;

/// Broadcasts request keys to anyone observing them.
///
/// Publishing with no subscribers is not an error; a slow subscriber that
/// falls behind loses the oldest keys.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<String>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn notify(&self, key: &str) {
        if self.tx.send(key.to_string()).is_ok() {
            tracing::trace!(key, "change notified");
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(NOTIFY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_keys() {
        let notifier = ChangeNotifier::default();
        let mut rx = notifier.subscribe();
        notifier.notify("listing:mem:/a");
        assert_eq!(rx.recv().await.unwrap(), "listing:mem:/a");
    }

    #[test]
    fn notify_without_subscribers_is_fine() {
        let notifier = ChangeNotifier::new(4);
        notifier.notify("resolve:mem:/");
        // A later subscriber does not see earlier keys.
        let mut rx = notifier.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
