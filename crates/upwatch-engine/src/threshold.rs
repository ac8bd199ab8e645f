//! Metric threshold evaluation.
//!
//! All functions are pure: the caller supplies the monitor's prior metric
//! events (newest first, as `EventStore::recent_metric_events` returns
//! them) and the verdict depends only on the arguments.

use chrono::{DateTime, Duration, Utc};
use upwatch_common::types::{MetricSettings, MonitorEvent, ThresholdStrategy};

/// A value is out of range when it violates any configured bound. Both
/// bounds optional; no bounds means nothing is ever out of range.
pub fn is_out_of_range(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    if let Some(min) = min {
        if value < min {
            return true;
        }
    }
    if let Some(max) = max {
        if value > max {
            return true;
        }
    }
    false
}

/// Decides whether `value`, observed now, is an alert-worthy breach under
/// the monitor's configured strategy.
///
/// `prior` is the monitor's earlier metric events ordered newest first and
/// must not include the current observation.
pub fn evaluate(
    settings: &MetricSettings,
    value: f64,
    prior: &[MonitorEvent],
    now: DateTime<Utc>,
) -> bool {
    match settings.strategy {
        ThresholdStrategy::Immediate => {
            is_out_of_range(value, settings.min_value, settings.max_value)
        }
        ThresholdStrategy::ConsecutiveCount => {
            if !is_out_of_range(value, settings.min_value, settings.max_value) {
                return false;
            }
            let needed = settings.threshold_count.max(1) as usize - 1;
            if prior.len() < needed {
                // Insufficient history: fail closed to "no breach".
                return false;
            }
            prior[..needed].iter().all(|e| e.out_of_range)
        }
        ThresholdStrategy::TimeDurationAverage => {
            let cutoff = now - Duration::seconds(settings.window_secs as i64);
            let samples = prior
                .iter()
                .filter(|e| e.timestamp >= cutoff && e.timestamp <= now)
                .filter_map(|e| e.value);
            average_breaches(settings, value, samples)
        }
        ThresholdStrategy::SampleCountAverage => {
            let take = settings.threshold_count.max(1) as usize - 1;
            let samples = prior.iter().filter_map(|e| e.value).take(take);
            average_breaches(settings, value, samples)
        }
    }
}

/// Averages the prior samples together with the current value. With zero
/// prior samples this degrades to evaluating the current value alone.
fn average_breaches(
    settings: &MetricSettings,
    value: f64,
    samples: impl Iterator<Item = f64>,
) -> bool {
    let mut sum = value;
    let mut count = 1usize;
    for sample in samples {
        sum += sample;
        count += 1;
    }
    is_out_of_range(sum / count as f64, settings.min_value, settings.max_value)
}
