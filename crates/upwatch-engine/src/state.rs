//! Service availability state machine.
//!
//! All `Service.state` mutation funnels through [`StateMachine`]; the
//! scheduler tasks and the check-in processor never write the field
//! directly. Down/Recovery transitions raise alerts unless a mute window
//! covers the instant of the transition — the transition itself always
//! happens.

use crate::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use upwatch_common::events::{DomainEvent, EventBroadcaster};
use upwatch_common::types::{Alert, AlertType, Service, ServiceState};
use upwatch_store::Store;

pub struct StateMachine {
    store: Arc<dyn Store>,
    broadcaster: Arc<dyn EventBroadcaster>,
}

impl StateMachine {
    pub fn new(store: Arc<dyn Store>, broadcaster: Arc<dyn EventBroadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Transitions the service to `Up`. No-op when Paused or already Up.
    ///
    /// Returns the Recovery alert when the service came back from Down and
    /// no mute window swallowed it.
    pub async fn transition_to_up(&self, service_id: &str, reason: &str) -> Result<Option<Alert>> {
        let mut service = self.store.get_service(service_id).await?;
        if matches!(service.state, ServiceState::Paused | ServiceState::Up) {
            return Ok(None);
        }

        let from = service.state;
        self.apply(&mut service, ServiceState::Up, reason).await?;

        if from == ServiceState::Down {
            return self.raise_alert(&service, AlertType::Recovery, reason).await;
        }
        Ok(None)
    }

    /// Transitions the service to `Down` and raises an alert of the given
    /// type. No-op when Paused or already Down.
    pub async fn transition_to_down(
        &self,
        service_id: &str,
        alert_type: AlertType,
        reason: &str,
    ) -> Result<Option<Alert>> {
        let mut service = self.store.get_service(service_id).await?;
        if matches!(service.state, ServiceState::Paused | ServiceState::Down) {
            return Ok(None);
        }

        self.apply(&mut service, ServiceState::Down, reason).await?;
        self.raise_alert(&service, alert_type, reason).await
    }

    /// Pauses the service until `until`. Unconditional: pausing an already
    /// paused service refreshes the window.
    pub async fn pause(
        &self,
        service_id: &str,
        until: Option<DateTime<Utc>>,
        auto_resume: bool,
    ) -> Result<()> {
        let mut service = self.store.get_service(service_id).await?;
        service.previous_state = service.state;
        service.state = ServiceState::Paused;
        service.paused_until = until;
        service.auto_resume = auto_resume;
        service.updated_at = Utc::now();
        self.store.update_service(&service).await?;
        info!(
            service_id = %service.id,
            until = ?until,
            auto_resume,
            "Service paused"
        );
        Ok(())
    }

    /// Resumes a paused service into `Unknown` — not the pre-pause state,
    /// since the service's true health is unknown until it checks in again.
    pub async fn resume(&self, service_id: &str) -> Result<()> {
        let mut service = self.store.get_service(service_id).await?;
        if service.state != ServiceState::Paused {
            return Ok(());
        }
        service.previous_state = ServiceState::Paused;
        service.state = ServiceState::Unknown;
        service.paused_until = None;
        service.auto_resume = false;
        service.updated_at = Utc::now();
        self.store.update_service(&service).await?;
        info!(service_id = %service.id, "Service resumed");
        self.broadcaster.publish(DomainEvent::ServiceStateChanged {
            service_id: service.id.clone(),
            from: ServiceState::Paused,
            to: ServiceState::Unknown,
            reason: "resumed".to_string(),
            at: service.updated_at,
        });
        Ok(())
    }

    async fn apply(&self, service: &mut Service, to: ServiceState, reason: &str) -> Result<()> {
        let from = service.state;
        service.previous_state = from;
        service.state = to;
        service.updated_at = Utc::now();
        self.store.update_service(service).await?;
        info!(
            service_id = %service.id,
            service = %service.name,
            from = %from,
            to = %to,
            reason,
            "Service state changed"
        );
        self.broadcaster.publish(DomainEvent::ServiceStateChanged {
            service_id: service.id.clone(),
            from,
            to,
            reason: reason.to_string(),
            at: service.updated_at,
        });
        Ok(())
    }

    /// Persists an alert for the transition unless a mute window is active
    /// right now. A muted alert is computed but never stored.
    async fn raise_alert(
        &self,
        service: &Service,
        alert_type: AlertType,
        reason: &str,
    ) -> Result<Option<Alert>> {
        let now = Utc::now();
        if let Some(window) = self.store.active_mute_window(&service.id, now).await? {
            debug!(
                service_id = %service.id,
                window_id = %window.id,
                alert_type = %alert_type,
                "Alert suppressed (mute window active)"
            );
            return Ok(None);
        }

        let alert = Alert::new(service, alert_type, reason);
        self.store.add_alert(alert.clone()).await?;
        info!(
            service_id = %service.id,
            alert_id = %alert.id,
            alert_type = %alert_type,
            severity = %alert.severity,
            "Alert raised"
        );
        self.broadcaster.publish(DomainEvent::AlertRaised {
            alert_id: alert.id.clone(),
            service_id: service.id.clone(),
            alert_type,
            at: alert.created_at,
        });
        Ok(Some(alert))
    }
}
