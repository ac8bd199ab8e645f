use crate::config::RetentionConfig;
use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use upwatch_common::types::{Granularity, MonitorKind};
use upwatch_store::Store;

/// Sweeps raw events and rollups past their retention windows.
/// Monthly rollups are kept forever.
pub struct EventRetentionScheduler {
    store: Arc<dyn Store>,
    retention: RetentionConfig,
    tick_secs: u64,
}

impl EventRetentionScheduler {
    pub fn new(store: Arc<dyn Store>, retention: RetentionConfig, tick_secs: u64) -> Self {
        Self {
            store,
            retention,
            tick_secs,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(tick_secs = self.tick_secs, "Event retention scheduler started");
        let mut tick = interval(tokio::time::Duration::from_secs(self.tick_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event retention scheduler stopped");
                    break;
                }
                _ = tick.tick() => {
                    if let Err(e) = self.pass().await {
                        tracing::error!(error = %e, "Event retention pass failed");
                    }
                }
            }
        }
    }

    pub async fn pass(&self) -> Result<()> {
        let now = Utc::now();

        let events_removed = self
            .store
            .delete_events_older_than(now - Duration::days(self.retention.event_days as i64))
            .await?;

        let tiers = [
            (Granularity::Hourly, self.retention.hourly_rollup_days),
            (Granularity::Daily, self.retention.daily_rollup_days),
            (Granularity::Weekly, self.retention.weekly_rollup_days),
        ];
        let mut rollups_removed = 0u64;
        for (granularity, days) in tiers {
            rollups_removed += self
                .store
                .delete_rollups_older_than(granularity, now - Duration::days(days as i64))
                .await?;
        }

        if events_removed > 0 || rollups_removed > 0 {
            tracing::info!(events_removed, rollups_removed, "Retention sweep completed");
        }
        Ok(())
    }
}

/// Applies each metric monitor's own raw-reading retention window —
/// per-monitor configuration, not the global event window.
pub struct MetricRetentionScheduler {
    store: Arc<dyn Store>,
    tick_secs: u64,
}

impl MetricRetentionScheduler {
    pub fn new(store: Arc<dyn Store>, tick_secs: u64) -> Self {
        Self { store, tick_secs }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(tick_secs = self.tick_secs, "Metric retention scheduler started");
        let mut tick = interval(tokio::time::Duration::from_secs(self.tick_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Metric retention scheduler stopped");
                    break;
                }
                _ = tick.tick() => {
                    if let Err(e) = self.pass().await {
                        tracing::error!(error = %e, "Metric retention pass failed");
                    }
                }
            }
        }
    }

    pub async fn pass(&self) -> Result<()> {
        let now = Utc::now();
        let monitors = self.store.list_monitors_of_kind(MonitorKind::Metric).await?;

        for monitor in monitors {
            let Some(settings) = &monitor.metric else {
                continue;
            };
            let cutoff = now - Duration::days(settings.retention_days as i64);
            let removed = self
                .store
                .delete_metric_events_older_than(&monitor.id, cutoff)
                .await?;
            if removed > 0 {
                tracing::debug!(
                    monitor_id = %monitor.id,
                    removed,
                    retention_days = settings.retention_days,
                    "Metric readings pruned"
                );
            }
        }
        Ok(())
    }
}
