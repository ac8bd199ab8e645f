//! Token-addressed check-in processing.
//!
//! The API layer maps inbound webhook/heartbeat/metric requests onto these
//! operations; the scheduler's health-check task reuses the same event
//! recording. Each check-in records one append-only [`MonitorEvent`],
//! stamps the monitor's `last_check_in` and drives the state machine.

use crate::error::{EngineError, Result};
use crate::state::StateMachine;
use crate::threshold;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;
use upwatch_common::types::{
    Alert, AlertType, EventKind, MetricSettings, Monitor, MonitorEvent, ThresholdStrategy,
};
use upwatch_store::Store;

pub struct CheckInProcessor {
    store: Arc<dyn Store>,
    state: Arc<StateMachine>,
}

impl CheckInProcessor {
    pub fn new(store: Arc<dyn Store>, state: Arc<StateMachine>) -> Self {
        Self { store, state }
    }

    /// Webhook-reported failure for the monitor owning `token`.
    pub async fn webhook_fail(&self, token: &str, message: Option<&str>) -> Result<Option<Alert>> {
        let monitor = self.monitor_by_token(token).await?;
        let reason = message.unwrap_or("Failure reported via webhook").to_string();
        self.record(&monitor, EventKind::CheckIn, false, None, false, Some(&reason))
            .await?;
        self.state
            .transition_to_down(&monitor.service_id, AlertType::Failure, &reason)
            .await
    }

    /// Webhook-reported recovery for the monitor owning `token`.
    pub async fn webhook_recover(&self, token: &str) -> Result<Option<Alert>> {
        let monitor = self.monitor_by_token(token).await?;
        self.record(&monitor, EventKind::CheckIn, true, None, false, None)
            .await?;
        self.state
            .transition_to_up(&monitor.service_id, "Recovery reported via webhook")
            .await
    }

    /// Heartbeat ping. Silence is detected by the scheduler's heartbeat
    /// watch task, not here.
    pub async fn heartbeat(&self, token: &str) -> Result<Option<Alert>> {
        let monitor = self.monitor_by_token(token).await?;
        self.record(&monitor, EventKind::CheckIn, true, None, false, None)
            .await?;
        self.state
            .transition_to_up(&monitor.service_id, "Heartbeat received")
            .await
    }

    /// Metric ingest: evaluates the monitor's threshold strategy against
    /// the new reading, records the event and transitions the service.
    ///
    /// Returns the alert raised on breach, if any survived mute windows.
    pub async fn metric(&self, token: &str, value: f64) -> Result<Option<Alert>> {
        let monitor = self.monitor_by_token(token).await?;
        let Some(settings) = monitor.metric.clone() else {
            debug!(monitor_id = %monitor.id, "Metric check-in on non-metric monitor ignored");
            return Ok(None);
        };

        let now = Utc::now();
        let prior = self.lookback(&monitor, &settings).await?;
        let breach = threshold::evaluate(&settings, value, &prior, now);
        let out_of_range =
            threshold::is_out_of_range(value, settings.min_value, settings.max_value);

        let message = breach.then(|| {
            format!(
                "Metric value {value} breached {} threshold",
                settings.strategy
            )
        });
        self.record(
            &monitor,
            EventKind::Metric,
            !out_of_range,
            Some(value),
            out_of_range,
            message.as_deref(),
        )
        .await?;

        if breach {
            let reason = message.unwrap_or_default();
            self.state
                .transition_to_down(&monitor.service_id, AlertType::Failure, &reason)
                .await
        } else {
            self.state
                .transition_to_up(&monitor.service_id, "Metric value within range")
                .await
        }
    }

    /// The prior-event slice the configured strategy needs, newest first.
    async fn lookback(
        &self,
        monitor: &Monitor,
        settings: &MetricSettings,
    ) -> Result<Vec<MonitorEvent>> {
        match settings.strategy {
            ThresholdStrategy::Immediate => Ok(Vec::new()),
            ThresholdStrategy::ConsecutiveCount | ThresholdStrategy::SampleCountAverage => {
                let take = settings.threshold_count.max(1) as usize - 1;
                Ok(self.store.recent_metric_events(&monitor.id, take).await?)
            }
            ThresholdStrategy::TimeDurationAverage => {
                let now = Utc::now();
                let from = now - Duration::seconds(settings.window_secs as i64);
                let mut events = self.store.events_in_range(&monitor.id, from, now).await?;
                events.retain(|e| e.kind == EventKind::Metric);
                events.reverse();
                Ok(events)
            }
        }
    }

    async fn monitor_by_token(&self, token: &str) -> Result<Monitor> {
        self.store
            .get_monitor_by_token(token)
            .await?
            .ok_or(EngineError::UnknownToken)
    }

    async fn record(
        &self,
        monitor: &Monitor,
        kind: EventKind,
        success: bool,
        value: Option<f64>,
        out_of_range: bool,
        message: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        self.store
            .add_event(MonitorEvent {
                id: upwatch_common::id::next_id(),
                monitor_id: monitor.id.clone(),
                service_id: monitor.service_id.clone(),
                kind,
                success,
                value,
                out_of_range,
                message: message.map(str::to_string),
                timestamp: now,
                created_at: now,
            })
            .await?;
        self.store.set_last_check_in(&monitor.id, now).await?;
        Ok(())
    }
}
