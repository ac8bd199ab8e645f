use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use upwatch_common::types::{AlertType, EventKind, MonitorEvent, MonitorKind, ServiceState};
use upwatch_engine::state::StateMachine;
use upwatch_store::Store;

/// Detects heartbeat monitors that have gone silent past their grace
/// period and takes their service down.
pub struct HeartbeatWatchScheduler {
    store: Arc<dyn Store>,
    state: Arc<StateMachine>,
    tick_secs: u64,
}

impl HeartbeatWatchScheduler {
    pub fn new(store: Arc<dyn Store>, state: Arc<StateMachine>, tick_secs: u64) -> Self {
        Self {
            store,
            state,
            tick_secs,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(tick_secs = self.tick_secs, "Heartbeat watch scheduler started");
        let mut tick = interval(tokio::time::Duration::from_secs(self.tick_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Heartbeat watch scheduler stopped");
                    break;
                }
                _ = tick.tick() => {
                    if let Err(e) = self.pass().await {
                        tracing::error!(error = %e, "Heartbeat watch pass failed");
                    }
                }
            }
        }
    }

    pub async fn pass(&self) -> Result<()> {
        let now = Utc::now();
        let monitors = self.store.list_monitors_of_kind(MonitorKind::Heartbeat).await?;

        for monitor in monitors {
            let last = monitor.last_check_in.unwrap_or(monitor.created_at);
            let deadline = last
                + Duration::seconds((monitor.interval_secs + monitor.grace_period_secs) as i64);
            if deadline >= now {
                continue;
            }

            let service = match self.store.get_service(&monitor.service_id).await {
                Ok(service) => service,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            if matches!(service.state, ServiceState::Paused | ServiceState::Down) {
                continue;
            }

            let overdue = (now - last).num_seconds();
            let reason = format!(
                "Heartbeat missed: last check-in {overdue}s ago (interval {}s, grace {}s)",
                monitor.interval_secs, monitor.grace_period_secs
            );
            tracing::warn!(
                monitor_id = %monitor.id,
                service = %service.name,
                overdue_secs = overdue,
                "Heartbeat missed"
            );

            self.store
                .add_event(MonitorEvent {
                    id: upwatch_common::id::next_id(),
                    monitor_id: monitor.id.clone(),
                    service_id: service.id.clone(),
                    kind: EventKind::StateChange,
                    success: false,
                    value: None,
                    out_of_range: false,
                    message: Some(reason.clone()),
                    timestamp: now,
                    created_at: now,
                })
                .await?;

            if let Err(e) = self
                .state
                .transition_to_down(&service.id, AlertType::MissedHeartbeat, &reason)
                .await
            {
                if e.is_not_found() {
                    continue;
                }
                return Err(e.into());
            }
        }
        Ok(())
    }
}
