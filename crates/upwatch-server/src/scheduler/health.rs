use anyhow::Result;
use chrono::{Duration, Utc};
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use upwatch_common::types::{
    AlertType, EventKind, HealthCheckSettings, Monitor, MonitorEvent, MonitorKind,
};
use upwatch_engine::state::StateMachine;
use upwatch_store::Store;

enum CheckOutcome {
    Success,
    Failure(String),
}

/// Polls due HealthCheck monitors over HTTP and drives their service state
/// from the outcome.
pub struct HealthCheckScheduler {
    store: Arc<dyn Store>,
    state: Arc<StateMachine>,
    client: reqwest::Client,
    tick_secs: u64,
}

impl HealthCheckScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        state: Arc<StateMachine>,
        client: reqwest::Client,
        tick_secs: u64,
    ) -> Self {
        Self {
            store,
            state,
            client,
            tick_secs,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(tick_secs = self.tick_secs, "Health check scheduler started");
        let mut tick = interval(tokio::time::Duration::from_secs(self.tick_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Health check scheduler stopped");
                    break;
                }
                _ = tick.tick() => {
                    // In-flight probes are dropped with the pass on cancel,
                    // so shutdown stays prompt.
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!("Health check scheduler stopped");
                            break;
                        }
                        result = self.pass() => {
                            if let Err(e) = result {
                                tracing::error!(error = %e, "Health check pass failed");
                            }
                        }
                    }
                }
            }
        }
    }

    pub async fn pass(&self) -> Result<()> {
        let now = Utc::now();
        let monitors = self
            .store
            .list_monitors_of_kind(MonitorKind::HealthCheck)
            .await?;

        for monitor in monitors {
            let due = match monitor.last_check_in {
                None => true,
                Some(last) => last + Duration::seconds(monitor.interval_secs as i64) <= now,
            };
            if !due {
                continue;
            }
            if let Err(e) = self.check_monitor(&monitor).await {
                tracing::error!(monitor_id = %monitor.id, error = %e, "Health check failed to record");
            }
        }
        Ok(())
    }

    async fn check_monitor(&self, monitor: &Monitor) -> Result<()> {
        let Some(settings) = monitor.health_check.clone() else {
            tracing::warn!(monitor_id = %monitor.id, "HealthCheck monitor has no settings, skipping");
            return Ok(());
        };

        let start = Instant::now();
        let outcome = self.probe(&settings).await;
        let elapsed_ms = start.elapsed().as_millis() as f64;
        let now = Utc::now();

        let (success, message) = match &outcome {
            CheckOutcome::Success => (true, None),
            CheckOutcome::Failure(reason) => (false, Some(reason.clone())),
        };

        self.store
            .add_event(MonitorEvent {
                id: upwatch_common::id::next_id(),
                monitor_id: monitor.id.clone(),
                service_id: monitor.service_id.clone(),
                kind: EventKind::Poll,
                success,
                value: Some(elapsed_ms),
                out_of_range: false,
                message: message.clone(),
                timestamp: now,
                created_at: now,
            })
            .await?;
        self.store.set_last_check_in(&monitor.id, now).await?;

        let transition = match outcome {
            CheckOutcome::Success => {
                self.state
                    .transition_to_up(&monitor.service_id, "Health check passed")
                    .await
            }
            CheckOutcome::Failure(reason) => {
                tracing::warn!(
                    monitor_id = %monitor.id,
                    url = %settings.url,
                    reason = %reason,
                    elapsed_ms,
                    "Health check failed"
                );
                self.state
                    .transition_to_down(&monitor.service_id, AlertType::FailedHealthCheck, &reason)
                    .await
            }
        };
        match transition {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Issues the configured request and classifies the response. The
    /// monitor's own timeout overrides the client default per request.
    async fn probe(&self, settings: &HealthCheckSettings) -> CheckOutcome {
        let method = reqwest::Method::from_bytes(settings.method.to_uppercase().as_bytes())
            .unwrap_or(reqwest::Method::GET);

        let response = self
            .client
            .request(method, &settings.url)
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return CheckOutcome::Failure(format!(
                    "Health check timed out after {}s",
                    settings.timeout_secs
                ));
            }
            Err(e) => return CheckOutcome::Failure(format!("Connection error: {e}")),
        };

        let status = response.status();
        let expected = if settings.expected_status_codes.is_empty() {
            status.is_success()
        } else {
            settings.expected_status_codes.contains(&status.as_u16())
        };
        if !expected {
            return CheckOutcome::Failure(format!("Unexpected status code: {}", status.as_u16()));
        }

        if let Some(pattern) = &settings.body_pattern {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => return CheckOutcome::Failure(format!("Failed to read body: {e}")),
            };
            match Regex::new(pattern) {
                Ok(re) if re.is_match(&body) => CheckOutcome::Success,
                Ok(_) => CheckOutcome::Failure(format!(
                    "Response body did not match expected pattern: {pattern}"
                )),
                Err(e) => CheckOutcome::Failure(format!("Invalid body pattern: {e}")),
            }
        } else {
            CheckOutcome::Success
        }
    }
}
