//! Rollup statistics calculator.
//!
//! Pure: one call folds a period's events into a single [`MonitorRollup`]
//! row. The scheduler decides which periods to compute and upserts the
//! result; calling this twice over the same events is idempotent.

use chrono::{DateTime, Utc};
use upwatch_common::types::{Granularity, MonitorEvent, MonitorRollup};

/// Computes the rollup for one (monitor, granularity, period).
///
/// Count/success/failure are plain tallies over all events. The statistics
/// fields describe only events carrying a numeric value and are `None`
/// when the period has none.
pub fn compute(
    events: &[MonitorEvent],
    monitor_id: &str,
    service_id: &str,
    granularity: Granularity,
    period_start: DateTime<Utc>,
) -> MonitorRollup {
    let count = events.len() as u64;
    let success_count = events.iter().filter(|e| e.success).count() as u64;
    let failure_count = count - success_count;
    let uptime_percent = if count > 0 {
        Some(round2(success_count as f64 / count as f64 * 100.0))
    } else {
        None
    };

    let mut values: Vec<f64> = events.iter().filter_map(|e| e.value).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let now = Utc::now();
    let mut rollup = MonitorRollup {
        id: upwatch_common::id::next_id(),
        monitor_id: monitor_id.to_string(),
        service_id: service_id.to_string(),
        granularity,
        period_start,
        count,
        success_count,
        failure_count,
        uptime_percent,
        min: None,
        max: None,
        mean: None,
        median: None,
        p80: None,
        p90: None,
        p95: None,
        std_dev: None,
        created_at: now,
        updated_at: now,
    };

    if values.is_empty() {
        return rollup;
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    rollup.min = Some(values[0]);
    rollup.max = Some(values[n - 1]);
    rollup.mean = Some(mean);
    rollup.median = Some(median(&values));
    rollup.p80 = Some(percentile(&values, 0.80));
    rollup.p90 = Some(percentile(&values, 0.90));
    rollup.p95 = Some(percentile(&values, 0.95));
    rollup.std_dev = Some(std_dev(&values, mean));
    rollup
}

/// Midpoint average for even counts, middle element otherwise.
/// `values` must be sorted.
fn median(values: &[f64]) -> f64 {
    let n = values.len();
    if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    }
}

/// Linear interpolation at rank `k * (n - 1)` between the floor and ceil
/// neighbors. `values` must be sorted.
fn percentile(values: &[f64], k: f64) -> f64 {
    let rank = k * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return values[lower];
    }
    let fraction = rank - lower as f64;
    values[lower] + (values[upper] - values[lower]) * fraction
}

/// Population standard deviation (divide by n, not n - 1).
fn std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
