use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use upwatch_common::types::{Granularity, Monitor};
use upwatch_engine::rollup;
use upwatch_store::Store;

/// Aggregates raw events into rollup tiers.
///
/// Each coarser tier is gated on the existence of the finer tier's rollups
/// for its period — not on raw events — so a partially aggregated period
/// is never promoted.
pub struct RollupScheduler {
    store: Arc<dyn Store>,
    tick_secs: u64,
}

impl RollupScheduler {
    pub fn new(store: Arc<dyn Store>, tick_secs: u64) -> Self {
        Self { store, tick_secs }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(tick_secs = self.tick_secs, "Rollup scheduler started");
        let mut tick = interval(tokio::time::Duration::from_secs(self.tick_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Rollup scheduler stopped");
                    break;
                }
                _ = tick.tick() => {
                    if let Err(e) = self.pass(Utc::now()).await {
                        tracing::error!(error = %e, "Rollup pass failed");
                    }
                }
            }
        }
    }

    pub async fn pass(&self, now: DateTime<Utc>) -> Result<()> {
        let monitors = self.store.list_monitors().await?;
        for monitor in monitors {
            if let Err(e) = self.aggregate_monitor(&monitor, now).await {
                tracing::error!(monitor_id = %monitor.id, error = %e, "Rollup aggregation failed");
            }
        }
        Ok(())
    }

    async fn aggregate_monitor(&self, monitor: &Monitor, now: DateTime<Utc>) -> Result<()> {
        // Hourly rollup for the just-completed hour, only when it saw events.
        let hour_start = Granularity::Hourly.period_start(now - Duration::hours(1));
        self.compute_tier(monitor, Granularity::Hourly, hour_start, true)
            .await?;

        // Daily for yesterday, gated on yesterday's hourly rollups.
        let yesterday = Granularity::Daily.period_start(now - Duration::days(1));
        if self
            .tier_exists(monitor, Granularity::Hourly, yesterday, Granularity::Daily)
            .await?
        {
            self.compute_tier(monitor, Granularity::Daily, yesterday, false)
                .await?;
        }

        // Weekly (Monday-anchored) for the week containing yesterday, gated
        // on that week's dailies.
        let week_start = Granularity::Weekly.period_start(yesterday);
        if self
            .tier_exists(monitor, Granularity::Daily, week_start, Granularity::Weekly)
            .await?
        {
            self.compute_tier(monitor, Granularity::Weekly, week_start, false)
                .await?;
        }

        // Monthly for the month containing yesterday, gated on its dailies.
        let month_start = Granularity::Monthly.period_start(yesterday);
        if self
            .tier_exists(monitor, Granularity::Daily, month_start, Granularity::Monthly)
            .await?
        {
            self.compute_tier(monitor, Granularity::Monthly, month_start, false)
                .await?;
        }

        Ok(())
    }

    /// Whether any `finer`-granularity rollup exists inside the `coarser`
    /// period starting at `period_start`.
    async fn tier_exists(
        &self,
        monitor: &Monitor,
        finer: Granularity,
        period_start: DateTime<Utc>,
        coarser: Granularity,
    ) -> Result<bool> {
        let period_end = coarser.period_end(period_start);
        let existing = self
            .store
            .rollups_in_range(&monitor.id, finer, period_start, period_end)
            .await?;
        Ok(!existing.is_empty())
    }

    /// Computes one rollup from the period's raw events and upserts it.
    /// With `require_events`, an empty period is skipped entirely.
    async fn compute_tier(
        &self,
        monitor: &Monitor,
        granularity: Granularity,
        period_start: DateTime<Utc>,
        require_events: bool,
    ) -> Result<()> {
        let period_end = granularity.period_end(period_start);
        let events = self
            .store
            .events_in_range(&monitor.id, period_start, period_end)
            .await?;
        if require_events && events.is_empty() {
            return Ok(());
        }

        let rollup = rollup::compute(
            &events,
            &monitor.id,
            &monitor.service_id,
            granularity,
            period_start,
        );
        tracing::debug!(
            monitor_id = %monitor.id,
            granularity = %granularity,
            period_start = %period_start,
            count = rollup.count,
            "Rollup upserted"
        );
        self.store.upsert_rollup(rollup).await?;
        Ok(())
    }
}
