use tokio::sync::broadcast;
use upwatch_common::events::{DomainEvent, EventBroadcaster};

/// `tokio::sync::broadcast`-backed event fan-out for real-time UI push.
///
/// Sends never block; when no subscriber is listening the event is simply
/// dropped, which is the contract the engine expects.
pub struct BroadcastEmitter {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribes a new receiver; slow receivers lag and drop, they never
    /// backpressure the engine.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl EventBroadcaster for BroadcastEmitter {
    fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use upwatch_common::types::ServiceState;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let emitter = BroadcastEmitter::new(16);
        let mut rx = emitter.subscribe();
        emitter.publish(DomainEvent::ServiceStateChanged {
            service_id: "s1".into(),
            from: ServiceState::Unknown,
            to: ServiceState::Up,
            reason: "check-in".into(),
            at: Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, DomainEvent::ServiceStateChanged { .. }));
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let emitter = BroadcastEmitter::new(16);
        emitter.publish(DomainEvent::AlertDispatched {
            alert_id: "a1".into(),
            service_id: "s1".into(),
            at: Utc::now(),
        });
    }
}
