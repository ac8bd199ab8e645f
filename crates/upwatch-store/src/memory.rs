//! In-memory reference implementation of the store contracts.
//!
//! Backs tests and single-node deployments. Every map is guarded by its own
//! `RwLock`; scheduler passes acquire, use and release within the pass, so
//! no lock is held across an await on external I/O.

use crate::error::{Result, StoreError};
use crate::{
    AlertStore, ContactStore, DependencyStore, EventStore, MonitorStore, MuteWindowStore,
    PeerStore, RollupStore, ServiceStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use upwatch_common::types::{
    Alert, Contact, ContactChannel, EventKind, Granularity, Monitor, MonitorEvent, MonitorKind,
    MonitorRollup, MuteWindow, Peer, Service, ServiceDependency, ServiceState,
};

type RollupKey = (String, Granularity, i64);

#[derive(Default)]
pub struct MemoryStore {
    services: RwLock<HashMap<String, Service>>,
    monitors: RwLock<HashMap<String, Monitor>>,
    events: RwLock<Vec<MonitorEvent>>,
    rollups: RwLock<HashMap<RollupKey, MonitorRollup>>,
    alerts: RwLock<HashMap<String, Alert>>,
    mute_windows: RwLock<HashMap<String, MuteWindow>>,
    peers: RwLock<HashMap<String, Peer>>,
    contacts: RwLock<HashMap<String, Contact>>,
    channels: RwLock<HashMap<String, ContactChannel>>,
    service_contacts: RwLock<Vec<(String, String)>>,
    dependencies: RwLock<HashMap<String, ServiceDependency>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rollup_key(rollup: &MonitorRollup) -> RollupKey {
        (
            rollup.monitor_id.clone(),
            rollup.granularity,
            rollup.period_start.timestamp(),
        )
    }
}

#[async_trait]
impl ServiceStore for MemoryStore {
    async fn get_service(&self, id: &str) -> Result<Service> {
        self.services
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "service",
                id: id.to_string(),
            })
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        let mut services: Vec<Service> = self.services.read().await.values().cloned().collect();
        services.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(services)
    }

    async fn list_services_in_state(&self, state: ServiceState) -> Result<Vec<Service>> {
        let mut services: Vec<Service> = self
            .services
            .read()
            .await
            .values()
            .filter(|s| s.state == state)
            .cloned()
            .collect();
        services.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(services)
    }

    async fn add_service(&self, service: Service) -> Result<()> {
        self.services
            .write()
            .await
            .insert(service.id.clone(), service);
        Ok(())
    }

    async fn update_service(&self, service: &Service) -> Result<()> {
        let mut services = self.services.write().await;
        if !services.contains_key(&service.id) {
            return Err(StoreError::NotFound {
                entity: "service",
                id: service.id.clone(),
            });
        }
        services.insert(service.id.clone(), service.clone());
        Ok(())
    }

    async fn delete_service(&self, id: &str) -> Result<()> {
        self.services.write().await.remove(id);

        let monitor_ids: Vec<String> = {
            let mut monitors = self.monitors.write().await;
            let ids: Vec<String> = monitors
                .values()
                .filter(|m| m.service_id == id)
                .map(|m| m.id.clone())
                .collect();
            monitors.retain(|_, m| m.service_id != id);
            ids
        };

        self.events.write().await.retain(|e| e.service_id != id);
        self.rollups
            .write()
            .await
            .retain(|_, r| !monitor_ids.contains(&r.monitor_id) && r.service_id != id);
        self.alerts.write().await.retain(|_, a| a.service_id != id);
        self.mute_windows
            .write()
            .await
            .retain(|_, w| w.service_id != id);
        self.dependencies
            .write()
            .await
            .retain(|_, d| d.dependent_service_id != id && d.dependency_service_id != id);
        self.service_contacts
            .write()
            .await
            .retain(|(sid, _)| sid != id);
        Ok(())
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn get_monitor(&self, id: &str) -> Result<Monitor> {
        self.monitors
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "monitor",
                id: id.to_string(),
            })
    }

    async fn get_monitor_by_token(&self, token: &str) -> Result<Option<Monitor>> {
        Ok(self
            .monitors
            .read()
            .await
            .values()
            .find(|m| m.token == token)
            .cloned())
    }

    async fn list_monitors(&self) -> Result<Vec<Monitor>> {
        let mut monitors: Vec<Monitor> = self.monitors.read().await.values().cloned().collect();
        monitors.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(monitors)
    }

    async fn list_monitors_of_kind(&self, kind: MonitorKind) -> Result<Vec<Monitor>> {
        let mut monitors: Vec<Monitor> = self
            .monitors
            .read()
            .await
            .values()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect();
        monitors.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(monitors)
    }

    async fn add_monitor(&self, monitor: Monitor) -> Result<()> {
        let mut monitors = self.monitors.write().await;
        if monitors.values().any(|m| m.token == monitor.token) {
            return Err(StoreError::Conflict {
                entity: "monitor",
                field: "token",
                value: monitor.token,
            });
        }
        monitors.insert(monitor.id.clone(), monitor);
        Ok(())
    }

    async fn update_monitor(&self, monitor: &Monitor) -> Result<()> {
        let mut monitors = self.monitors.write().await;
        if !monitors.contains_key(&monitor.id) {
            return Err(StoreError::NotFound {
                entity: "monitor",
                id: monitor.id.clone(),
            });
        }
        monitors.insert(monitor.id.clone(), monitor.clone());
        Ok(())
    }

    async fn set_last_check_in(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut monitors = self.monitors.write().await;
        let monitor = monitors.get_mut(id).ok_or_else(|| StoreError::NotFound {
            entity: "monitor",
            id: id.to_string(),
        })?;
        monitor.last_check_in = Some(at);
        monitor.updated_at = at;
        Ok(())
    }

    async fn delete_monitor(&self, id: &str) -> Result<()> {
        self.monitors.write().await.remove(id);
        self.events.write().await.retain(|e| e.monitor_id != id);
        self.rollups.write().await.retain(|_, r| r.monitor_id != id);
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn add_event(&self, event: MonitorEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn events_in_range(
        &self,
        monitor_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MonitorEvent>> {
        let mut events: Vec<MonitorEvent> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.monitor_id == monitor_id && e.timestamp >= from && e.timestamp < to)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(events)
    }

    async fn recent_metric_events(
        &self,
        monitor_id: &str,
        limit: usize,
    ) -> Result<Vec<MonitorEvent>> {
        let mut events: Vec<MonitorEvent> = self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.monitor_id == monitor_id && e.kind == EventKind::Metric)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        Ok(events)
    }

    async fn delete_events_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|e| e.timestamp >= cutoff);
        Ok((before - events.len()) as u64)
    }

    async fn delete_metric_events_older_than(
        &self,
        monitor_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|e| {
            !(e.monitor_id == monitor_id && e.kind == EventKind::Metric && e.timestamp < cutoff)
        });
        Ok((before - events.len()) as u64)
    }
}

#[async_trait]
impl RollupStore for MemoryStore {
    async fn upsert_rollup(&self, mut rollup: MonitorRollup) -> Result<()> {
        let key = Self::rollup_key(&rollup);
        let mut rollups = self.rollups.write().await;
        if let Some(existing) = rollups.get(&key) {
            rollup.id = existing.id.clone();
            rollup.created_at = existing.created_at;
        }
        rollups.insert(key, rollup);
        Ok(())
    }

    async fn rollups_in_range(
        &self,
        monitor_id: &str,
        granularity: Granularity,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MonitorRollup>> {
        let mut rollups: Vec<MonitorRollup> = self
            .rollups
            .read()
            .await
            .values()
            .filter(|r| {
                r.monitor_id == monitor_id
                    && r.granularity == granularity
                    && r.period_start >= from
                    && r.period_start < to
            })
            .cloned()
            .collect();
        rollups.sort_by(|a, b| a.period_start.cmp(&b.period_start));
        Ok(rollups)
    }

    async fn delete_rollups_older_than(
        &self,
        granularity: Granularity,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let mut rollups = self.rollups.write().await;
        let before = rollups.len();
        rollups.retain(|_, r| !(r.granularity == granularity && r.period_start < cutoff));
        Ok((before - rollups.len()) as u64)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn add_alert(&self, alert: Alert) -> Result<()> {
        self.alerts.write().await.insert(alert.id.clone(), alert);
        Ok(())
    }

    async fn get_alert(&self, id: &str) -> Result<Alert> {
        self.alerts
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "alert",
                id: id.to_string(),
            })
    }

    async fn pending_alerts(&self) -> Result<Vec<Alert>> {
        let mut pending: Vec<Alert> = self
            .alerts
            .read()
            .await
            .values()
            .filter(|a| a.dispatched_at.is_none())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    async fn mark_dispatched(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts.get_mut(id).ok_or_else(|| StoreError::NotFound {
            entity: "alert",
            id: id.to_string(),
        })?;
        alert.dispatched_at = Some(at);
        alert.updated_at = at;
        Ok(())
    }

    async fn acknowledge_alert(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut alerts = self.alerts.write().await;
        match alerts.get_mut(id) {
            Some(alert) => {
                alert.acknowledged_at = Some(at);
                alert.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn alerts_for_service(&self, service_id: &str) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .read()
            .await
            .values()
            .filter(|a| a.service_id == service_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(alerts)
    }
}

#[async_trait]
impl MuteWindowStore for MemoryStore {
    async fn add_mute_window(&self, window: MuteWindow) -> Result<()> {
        self.mute_windows
            .write()
            .await
            .insert(window.id.clone(), window);
        Ok(())
    }

    async fn active_mute_window(
        &self,
        service_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<MuteWindow>> {
        Ok(self
            .mute_windows
            .read()
            .await
            .values()
            .find(|w| w.service_id == service_id && w.is_active(at))
            .cloned())
    }

    async fn delete_mute_window(&self, id: &str) -> Result<()> {
        self.mute_windows.write().await.remove(id);
        Ok(())
    }
}

#[async_trait]
impl PeerStore for MemoryStore {
    async fn add_peer(&self, peer: Peer) -> Result<()> {
        self.peers.write().await.insert(peer.id.clone(), peer);
        Ok(())
    }

    async fn list_peers(&self) -> Result<Vec<Peer>> {
        let mut peers: Vec<Peer> = self.peers.read().await.values().cloned().collect();
        peers.sort_by(|a, b| a.paired_at.cmp(&b.paired_at));
        Ok(peers)
    }

    async fn get_peer_by_heartbeat_token(&self, token: &str) -> Result<Option<Peer>> {
        Ok(self
            .peers
            .read()
            .await
            .values()
            .find(|p| p.heartbeat_token == token)
            .cloned())
    }

    async fn get_peer_by_webhook_token(&self, token: &str) -> Result<Option<Peer>> {
        Ok(self
            .peers
            .read()
            .await
            .values()
            .find(|p| p.webhook_token == token)
            .cloned())
    }

    async fn delete_peer(&self, id: &str) -> Result<()> {
        self.peers.write().await.remove(id);
        Ok(())
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn add_contact(&self, contact: Contact) -> Result<()> {
        self.contacts
            .write()
            .await
            .insert(contact.id.clone(), contact);
        Ok(())
    }

    async fn add_channel(&self, channel: ContactChannel) -> Result<()> {
        self.channels
            .write()
            .await
            .insert(channel.id.clone(), channel);
        Ok(())
    }

    async fn link_contact(&self, service_id: &str, contact_id: &str) -> Result<()> {
        let mut links = self.service_contacts.write().await;
        let link = (service_id.to_string(), contact_id.to_string());
        if !links.contains(&link) {
            links.push(link);
        }
        Ok(())
    }

    async fn contacts_for_service(&self, service_id: &str) -> Result<Vec<Contact>> {
        let links = self.service_contacts.read().await;
        let contacts = self.contacts.read().await;
        let mut resolved: Vec<Contact> = links
            .iter()
            .filter(|(sid, _)| sid == service_id)
            .filter_map(|(_, cid)| contacts.get(cid).cloned())
            .collect();
        resolved.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(resolved)
    }

    async fn default_contact(&self) -> Result<Option<Contact>> {
        Ok(self
            .contacts
            .read()
            .await
            .values()
            .find(|c| c.is_default)
            .cloned())
    }

    async fn channels_for_contact(&self, contact_id: &str) -> Result<Vec<ContactChannel>> {
        let mut channels: Vec<ContactChannel> = self
            .channels
            .read()
            .await
            .values()
            .filter(|c| c.contact_id == contact_id)
            .cloned()
            .collect();
        channels.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(channels)
    }
}

#[async_trait]
impl DependencyStore for MemoryStore {
    async fn list_dependencies(&self) -> Result<Vec<ServiceDependency>> {
        let mut edges: Vec<ServiceDependency> =
            self.dependencies.read().await.values().cloned().collect();
        edges.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(edges)
    }

    async fn add_dependency(&self, edge: ServiceDependency) -> Result<()> {
        self.dependencies
            .write()
            .await
            .insert(edge.id.clone(), edge);
        Ok(())
    }

    async fn remove_dependency(&self, id: &str) -> Result<()> {
        self.dependencies.write().await.remove(id);
        Ok(())
    }
}
