use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracefall_core::config::MAX_CHANNEL_CAPACITY;

/// Delivery capability the publisher depends on.
pub trait Broadcast: Send + Sync {
    /// Hands `message` to every current subscriber and returns how many
    /// subscribers it was queued for. Never waits on a subscriber.
    fn broadcast(&self, message: Arc<str>) -> usize;

    fn subscriber_count(&self) -> usize;
}

/// In-process subscriber set backed by a broadcast channel.
///
/// Each subscriber owns a queue of `capacity` messages; one that falls behind
/// loses its oldest messages instead of slowing down the others. `capacity`
/// is clamped to `1..=MAX_CHANNEL_CAPACITY`.
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<Arc<str>>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.clamp(1, MAX_CHANNEL_CAPACITY));
        Self { tx }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Broadcast for Hub {
    fn broadcast(&self, message: Arc<str>) -> usize {
        self.tx.send(message).unwrap_or(0)
    }

    fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<Arc<str>>,
}

impl Subscription {
    /// Next message in publish order, or `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "push subscriber lagged, oldest batches skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_identical_copy_to_every_subscriber() {
        let hub = Hub::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        let delivered = hub.broadcast(Arc::from("[1]"));
        assert_eq!(delivered, 2);
        assert_eq!(a.recv().await.as_deref(), Some("[1]"));
        assert_eq!(b.recv().await.as_deref(), Some("[1]"));
    }

    #[tokio::test]
    async fn no_subscribers_is_not_an_error() {
        let hub = Hub::new(8);
        assert_eq!(hub.broadcast(Arc::from("[]")), 0);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_messages() {
        let hub = Hub::new(8);
        let _early = hub.subscribe();
        hub.broadcast(Arc::from("first"));

        let mut late = hub.subscribe();
        hub.broadcast(Arc::from("second"));
        assert_eq!(late.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_newest_in_order() {
        let hub = Hub::new(2);
        let mut slow = hub.subscribe();
        for i in 0..5 {
            hub.broadcast(Arc::from(i.to_string()));
        }

        assert_eq!(slow.recv().await.as_deref(), Some("3"));
        assert_eq!(slow.recv().await.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn out_of_range_capacity_is_clamped() {
        let hub = Hub::new(usize::MAX);
        let mut sub = hub.subscribe();
        hub.broadcast(Arc::from("ok"));
        assert_eq!(sub.recv().await.as_deref(), Some("ok"));

        let hub = Hub::new(0);
        let mut sub = hub.subscribe();
        hub.broadcast(Arc::from("ok"));
        assert_eq!(sub.recv().await.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn subscription_ends_when_hub_dropped() {
        let hub = Hub::new(2);
        let mut sub = hub.subscribe();
        drop(hub);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_subscriber_leaves_the_set() {
        let hub = Hub::new(2);
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
