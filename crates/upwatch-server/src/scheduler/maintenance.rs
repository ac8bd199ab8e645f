use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use upwatch_common::types::ServiceState;
use upwatch_engine::state::StateMachine;
use upwatch_store::Store;

/// Resumes paused services whose maintenance window has elapsed.
pub struct MaintenanceResumeScheduler {
    store: Arc<dyn Store>,
    state: Arc<StateMachine>,
    tick_secs: u64,
}

impl MaintenanceResumeScheduler {
    pub fn new(store: Arc<dyn Store>, state: Arc<StateMachine>, tick_secs: u64) -> Self {
        Self {
            store,
            state,
            tick_secs,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(tick_secs = self.tick_secs, "Maintenance resume scheduler started");
        let mut tick = interval(tokio::time::Duration::from_secs(self.tick_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Maintenance resume scheduler stopped");
                    break;
                }
                _ = tick.tick() => {
                    if let Err(e) = self.pass().await {
                        tracing::error!(error = %e, "Maintenance resume pass failed");
                    }
                }
            }
        }
    }

    pub async fn pass(&self) -> Result<()> {
        let now = Utc::now();
        let paused = self
            .store
            .list_services_in_state(ServiceState::Paused)
            .await?;

        for service in paused {
            if !service.auto_resume {
                continue;
            }
            let Some(until) = service.paused_until else {
                continue;
            };
            if until > now {
                continue;
            }
            tracing::info!(
                service_id = %service.id,
                service = %service.name,
                "Maintenance window elapsed, resuming"
            );
            if let Err(e) = self.state.resume(&service.id).await {
                if e.is_not_found() {
                    continue;
                }
                return Err(e.into());
            }
        }
        Ok(())
    }
}
