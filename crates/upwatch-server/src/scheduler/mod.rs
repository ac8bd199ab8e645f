//! The engine's scheduled tasks.
//!
//! Each task is an independently-timed loop: sleep one tick, run one pass,
//! log and swallow any non-cancellation error, repeat until the shared
//! [`CancellationToken`] fires. Tasks coordinate through the store only —
//! no in-process lock spans two tasks, and the only cross-pass in-memory
//! state (the dispatch health flag, the per-peer last-sent map) is owned
//! by the single task that writes it.

pub mod dispatch;
pub mod health;
pub mod heartbeat;
pub mod maintenance;
pub mod peer_heartbeat;
pub mod retention;
pub mod rollup;

use crate::state::AppState;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawns every scheduler task. The returned handles complete once the
/// token is cancelled and each loop observes it.
pub fn spawn_all(state: &AppState, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
    let ticks = &state.config.scheduler;
    vec![
        tokio::spawn(
            heartbeat::HeartbeatWatchScheduler::new(
                state.store.clone(),
                state.state_machine.clone(),
                ticks.heartbeat_tick_secs,
            )
            .run(cancel.clone()),
        ),
        tokio::spawn(
            health::HealthCheckScheduler::new(
                state.store.clone(),
                state.state_machine.clone(),
                state.clients.health_check().clone(),
                ticks.health_check_tick_secs,
            )
            .run(cancel.clone()),
        ),
        tokio::spawn(
            maintenance::MaintenanceResumeScheduler::new(
                state.store.clone(),
                state.state_machine.clone(),
                ticks.maintenance_tick_secs,
            )
            .run(cancel.clone()),
        ),
        tokio::spawn(
            dispatch::AlertDispatchScheduler::new(
                state.store.clone(),
                state.dispatcher.clone(),
                state.peer_notifier.clone(),
                ticks.dispatch_tick_secs,
            )
            .run(cancel.clone()),
        ),
        tokio::spawn(
            rollup::RollupScheduler::new(state.store.clone(), ticks.rollup_tick_secs)
                .run(cancel.clone()),
        ),
        tokio::spawn(
            retention::EventRetentionScheduler::new(
                state.store.clone(),
                state.config.retention.clone(),
                ticks.retention_tick_secs,
            )
            .run(cancel.clone()),
        ),
        tokio::spawn(
            retention::MetricRetentionScheduler::new(
                state.store.clone(),
                ticks.metric_retention_tick_secs,
            )
            .run(cancel.clone()),
        ),
        tokio::spawn(
            peer_heartbeat::PeerHeartbeatScheduler::new(
                state.store.clone(),
                state.peer_notifier.clone(),
                ticks.peer_heartbeat_tick_secs,
            )
            .run(cancel),
        ),
    ]
}
