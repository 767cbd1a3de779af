use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// Publish-only sink for lifecycle and ledger events.
///
/// Delivery is fire-and-forget; callers publish only after the write being
/// reported has been acknowledged by the store.
pub trait EventBroadcaster: Send + Sync {
    fn publish(&self, event: ServerEvent);
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

impl EventBroadcaster for SseHub {
    fn publish(&self, event: ServerEvent) {
        self.broadcast(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = SseHub::new(4);
        let mut receiver = hub.subscribe();
        hub.publish(ServerEvent::new(Some("ping".into()), "{}".into()));
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("ping"));
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        SseHub::new(1).publish(ServerEvent::new(None, "lost".into()));
    }
}
