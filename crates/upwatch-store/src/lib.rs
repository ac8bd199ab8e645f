//! Persistence contracts for the upwatch engine.
//!
//! The core depends only on the repository-shaped traits defined here, one
//! per entity, aggregated by [`Store`]. The default backend is the
//! in-memory [`memory::MemoryStore`]; a database-backed implementation
//! plugs in behind the same traits without touching the engine.

pub mod error;
pub mod memory;


pub use error::{Result, StoreError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use upwatch_common::types::{
    Alert, Contact, ContactChannel, Granularity, Monitor, MonitorEvent, MonitorKind,
    MonitorRollup, MuteWindow, Peer, Service, ServiceDependency, ServiceState,
};

/// Service records. State mutation goes through the engine's state machine;
/// the store persists whatever it is handed.
#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn get_service(&self, id: &str) -> Result<Service>;
    async fn list_services(&self) -> Result<Vec<Service>>;
    async fn list_services_in_state(&self, state: ServiceState) -> Result<Vec<Service>>;
    async fn add_service(&self, service: Service) -> Result<()>;
    async fn update_service(&self, service: &Service) -> Result<()>;
    /// Deletes the service and everything it owns: monitors, events,
    /// rollups, alerts, mute windows, dependency edges and contact links.
    async fn delete_service(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait MonitorStore: Send + Sync {
    async fn get_monitor(&self, id: &str) -> Result<Monitor>;
    async fn get_monitor_by_token(&self, token: &str) -> Result<Option<Monitor>>;
    async fn list_monitors(&self) -> Result<Vec<Monitor>>;
    async fn list_monitors_of_kind(&self, kind: MonitorKind) -> Result<Vec<Monitor>>;
    async fn add_monitor(&self, monitor: Monitor) -> Result<()>;
    async fn update_monitor(&self, monitor: &Monitor) -> Result<()>;
    async fn set_last_check_in(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
    async fn delete_monitor(&self, id: &str) -> Result<()>;
}

/// Append-only monitor events.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn add_event(&self, event: MonitorEvent) -> Result<()>;
    /// Events for one monitor with `from <= timestamp < to`, ascending.
    async fn events_in_range(
        &self,
        monitor_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MonitorEvent>>;
    /// The monitor's most recent metric-ingest events, newest first.
    /// Threshold lookbacks consume this shape directly.
    async fn recent_metric_events(&self, monitor_id: &str, limit: usize)
        -> Result<Vec<MonitorEvent>>;
    /// Removes events older than `cutoff` across all monitors. Returns the
    /// number removed.
    async fn delete_events_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
    /// Removes one monitor's metric-ingest events older than `cutoff`.
    async fn delete_metric_events_older_than(
        &self,
        monitor_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64>;
}

/// Rollup rows, unique per (monitor, granularity, period start).
#[async_trait]
pub trait RollupStore: Send + Sync {
    /// Inserts or replaces the rollup for its (monitor, granularity,
    /// period_start) key, preserving the original `created_at` on replace.
    async fn upsert_rollup(&self, rollup: MonitorRollup) -> Result<()>;
    /// Rollups for one monitor and granularity with
    /// `from <= period_start < to`, ascending by period start.
    async fn rollups_in_range(
        &self,
        monitor_id: &str,
        granularity: Granularity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MonitorRollup>>;
    async fn delete_rollups_older_than(
        &self,
        granularity: Granularity,
        cutoff: DateTime<Utc>,
    ) -> Result<u64>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn add_alert(&self, alert: Alert) -> Result<()>;
    async fn get_alert(&self, id: &str) -> Result<Alert>;
    /// Alerts not yet dispatched, oldest first.
    async fn pending_alerts(&self) -> Result<Vec<Alert>>;
    async fn mark_dispatched(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
    /// Returns false when the alert does not exist.
    async fn acknowledge_alert(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;
    async fn alerts_for_service(&self, service_id: &str) -> Result<Vec<Alert>>;
}

#[async_trait]
pub trait MuteWindowStore: Send + Sync {
    async fn add_mute_window(&self, window: MuteWindow) -> Result<()>;
    /// The mute window covering `at` for the service, if any.
    async fn active_mute_window(
        &self,
        service_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<MuteWindow>>;
    async fn delete_mute_window(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait PeerStore: Send + Sync {
    async fn add_peer(&self, peer: Peer) -> Result<()>;
    async fn list_peers(&self) -> Result<Vec<Peer>>;
    async fn get_peer_by_heartbeat_token(&self, token: &str) -> Result<Option<Peer>>;
    async fn get_peer_by_webhook_token(&self, token: &str) -> Result<Option<Peer>>;
    async fn delete_peer(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn add_contact(&self, contact: Contact) -> Result<()>;
    async fn add_channel(&self, channel: ContactChannel) -> Result<()>;
    async fn link_contact(&self, service_id: &str, contact_id: &str) -> Result<()>;
    /// Contacts linked to the service (not including the default fallback).
    async fn contacts_for_service(&self, service_id: &str) -> Result<Vec<Contact>>;
    /// The designated default contact, if one is configured.
    async fn default_contact(&self) -> Result<Option<Contact>>;
    async fn channels_for_contact(&self, contact_id: &str) -> Result<Vec<ContactChannel>>;
}

/// Dependency edges as a flat list; cycle prevention lives in the engine's
/// graph module and runs before `add_dependency`.
#[async_trait]
pub trait DependencyStore: Send + Sync {
    async fn list_dependencies(&self) -> Result<Vec<ServiceDependency>>;
    async fn add_dependency(&self, edge: ServiceDependency) -> Result<()>;
    async fn remove_dependency(&self, id: &str) -> Result<()>;
}

/// The full persistence surface the engine and scheduler consume, shared as
/// one `Arc<dyn Store>`.
pub trait Store:
    ServiceStore
    + MonitorStore
    + EventStore
    + RollupStore
    + AlertStore
    + MuteWindowStore
    + PeerStore
    + ContactStore
    + DependencyStore
{
}

impl<T> Store for T where
    T: ServiceStore
        + MonitorStore
        + EventStore
        + RollupStore
        + AlertStore
        + MuteWindowStore
        + PeerStore
        + ContactStore
        + DependencyStore
{
}
