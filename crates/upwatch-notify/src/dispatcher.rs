//! Alert dispatch: contact resolution and channel fan-out.
//!
//! An alert is marked dispatched only when every attempted channel
//! succeeded in the same pass; otherwise it stays pending and the whole
//! fan-out is retried next pass. Channels that already succeeded may be
//! sent to again on a retry — per-channel dispatch state is not tracked.

use crate::plugin::ChannelRegistry;
use crate::NotificationChannel;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use upwatch_common::events::{DomainEvent, EventBroadcaster};
use upwatch_common::types::{Alert, Contact, Service};
use upwatch_store::{Result, Store};

pub struct AlertDispatcher {
    store: Arc<dyn Store>,
    registry: ChannelRegistry,
    /// Globally registered channels used when no contact resolves any —
    /// kept for single-channel deployments predating contacts.
    fallback_channels: Vec<Box<dyn NotificationChannel>>,
    broadcaster: Arc<dyn EventBroadcaster>,
}

impl AlertDispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        registry: ChannelRegistry,
        broadcaster: Arc<dyn EventBroadcaster>,
    ) -> Self {
        Self {
            store,
            registry,
            fallback_channels: Vec::new(),
            broadcaster,
        }
    }

    /// Registers a global fallback channel, consulted only when contact
    /// resolution yields no channels at all.
    pub fn add_fallback_channel(&mut self, channel: Box<dyn NotificationChannel>) {
        self.fallback_channels.push(channel);
    }

    /// Fans the alert out to every resolved channel. Returns whether the
    /// alert was fully dispatched (and marked so) in this attempt.
    pub async fn dispatch(&self, alert: &Alert) -> Result<bool> {
        let service = self.store.get_service(&alert.service_id).await?;
        let contacts = self.resolve_contacts(&service).await?;
        let channels = self.resolve_channels(&contacts).await?;

        let (attempted, failed) = if channels.is_empty() {
            self.send_all(alert, &service, self.fallback_channels.iter().map(|c| c.as_ref()))
                .await
        } else {
            self.send_all(alert, &service, channels.iter().map(|c| c.as_ref()))
                .await
        };

        if attempted == 0 {
            debug!(alert_id = %alert.id, "No notification channels resolved");
        }

        if failed > 0 {
            warn!(
                alert_id = %alert.id,
                attempted,
                failed,
                "Alert dispatch incomplete, will retry"
            );
            return Ok(false);
        }

        let now = Utc::now();
        self.store.mark_dispatched(&alert.id, now).await?;
        info!(
            alert_id = %alert.id,
            service = %service.name,
            channels = attempted,
            "Alert dispatched"
        );
        self.broadcaster.publish(DomainEvent::AlertDispatched {
            alert_id: alert.id.clone(),
            service_id: service.id.clone(),
            at: now,
        });
        Ok(true)
    }

    /// Contacts linked to the service, or the designated default contact
    /// when none are linked.
    async fn resolve_contacts(&self, service: &Service) -> Result<Vec<Contact>> {
        let linked = self.store.contacts_for_service(&service.id).await?;
        if !linked.is_empty() {
            return Ok(linked);
        }
        Ok(self.store.default_contact().await?.into_iter().collect())
    }

    /// All enabled channels across the resolved contacts, instantiated
    /// through the plugin registry. A channel whose config no longer parses
    /// is skipped with an error log — it will be counted against the alert
    /// once the config is fixed and it resolves again.
    async fn resolve_channels(
        &self,
        contacts: &[Contact],
    ) -> Result<Vec<Box<dyn NotificationChannel>>> {
        let mut channels = Vec::new();
        for contact in contacts {
            for row in self.store.channels_for_contact(&contact.id).await? {
                if !row.enabled {
                    continue;
                }
                match self
                    .registry
                    .create_channel(&row.channel_type, &row.id, &row.config)
                {
                    Ok(channel) => channels.push(channel),
                    Err(e) => {
                        warn!(
                            channel_id = %row.id,
                            channel_type = %row.channel_type,
                            error = %e,
                            "Skipping channel with invalid configuration"
                        );
                    }
                }
            }
        }
        Ok(channels)
    }

    /// Sends to every channel independently; a failure never short-circuits
    /// the rest. Returns (attempted, failed).
    async fn send_all<'a>(
        &self,
        alert: &Alert,
        service: &Service,
        channels: impl Iterator<Item = &'a dyn NotificationChannel>,
    ) -> (usize, usize) {
        let mut attempted = 0usize;
        let mut failed = 0usize;
        for channel in channels {
            if !channel.is_enabled() {
                continue;
            }
            attempted += 1;
            if !channel.validate_configuration() {
                warn!(
                    channel_type = channel.channel_type(),
                    alert_id = %alert.id,
                    "Channel configuration invalid, counted as failed send"
                );
                failed += 1;
                continue;
            }
            match channel.send_alert(alert, service).await {
                Ok(true) => {
                    debug!(
                        channel_type = channel.channel_type(),
                        alert_id = %alert.id,
                        "Alert sent"
                    );
                }
                Ok(false) => {
                    warn!(
                        channel_type = channel.channel_type(),
                        alert_id = %alert.id,
                        "Channel reported send failure"
                    );
                    failed += 1;
                }
                Err(e) => {
                    warn!(
                        channel_type = channel.channel_type(),
                        alert_id = %alert.id,
                        error = %e,
                        "Channel send errored"
                    );
                    failed += 1;
                }
            }
        }
        (attempted, failed)
    }
}
