use crate::types::{AlertType, ServiceState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain events published for real-time UI push.
///
/// The engine only publishes; the transport (SSE/websocket fan-out) is the
/// server's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ServiceStateChanged {
        service_id: String,
        from: ServiceState,
        to: ServiceState,
        reason: String,
        at: DateTime<Utc>,
    },
    AlertRaised {
        alert_id: String,
        service_id: String,
        alert_type: AlertType,
        at: DateTime<Utc>,
    },
    AlertDispatched {
        alert_id: String,
        service_id: String,
        at: DateTime<Utc>,
    },
    PeerPaired {
        peer_id: String,
        name: String,
        at: DateTime<Utc>,
    },
}

/// Sink for [`DomainEvent`]s.
///
/// Publishing is fire-and-forget: implementations must never block or fail
/// the caller. Dropped events are acceptable (a UI can always re-query).
pub trait EventBroadcaster: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Broadcaster that discards every event; used in tests and headless runs.
pub struct NoopBroadcaster;

impl EventBroadcaster for NoopBroadcaster {
    fn publish(&self, _event: DomainEvent) {}
}
