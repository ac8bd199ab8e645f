use crate::peer::{PeerAction, PeerNotifier};
use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use upwatch_notify::dispatcher::AlertDispatcher;
use upwatch_store::Store;

/// Drains pending alerts through the dispatcher.
///
/// The task also tracks dispatch health across passes: the first pass with
/// a failure pushes `fail` to every peer, and the first subsequent pass
/// where all pending alerts go out pushes `recover`. The flag is owned by
/// this task alone; nothing else writes it.
pub struct AlertDispatchScheduler {
    store: Arc<dyn Store>,
    dispatcher: Arc<AlertDispatcher>,
    peers: Arc<PeerNotifier>,
    tick_secs: u64,
    healthy: Mutex<bool>,
}

impl AlertDispatchScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Arc<AlertDispatcher>,
        peers: Arc<PeerNotifier>,
        tick_secs: u64,
    ) -> Self {
        Self {
            store,
            dispatcher,
            peers,
            tick_secs,
            healthy: Mutex::new(true),
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(tick_secs = self.tick_secs, "Alert dispatch scheduler started");
        let mut tick = interval(tokio::time::Duration::from_secs(self.tick_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Alert dispatch scheduler stopped");
                    break;
                }
                _ = tick.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!("Alert dispatch scheduler stopped");
                            break;
                        }
                        result = self.pass() => {
                            if let Err(e) = result {
                                tracing::error!(error = %e, "Alert dispatch pass failed");
                            }
                        }
                    }
                }
            }
        }
    }

    pub async fn pass(&self) -> Result<()> {
        let pending = self.store.pending_alerts().await?;
        if pending.is_empty() {
            return Ok(());
        }

        let mut any_failed = false;
        for alert in &pending {
            match self.dispatcher.dispatch(alert).await {
                Ok(true) => {}
                Ok(false) => any_failed = true,
                Err(e) if e.is_not_found() => {
                    tracing::debug!(alert_id = %alert.id, "Alert target vanished, skipping");
                }
                Err(e) => {
                    any_failed = true;
                    tracing::error!(alert_id = %alert.id, error = %e, "Alert dispatch errored");
                }
            }
        }

        if let Some(action) = self.health_transition(any_failed) {
            tracing::info!(action = %action, "Dispatch health changed, notifying peers");
            self.peers.notify_all(action).await;
        }
        Ok(())
    }

    /// Applies this pass's outcome to the health flag, returning the peer
    /// action when the flag flipped.
    fn health_transition(&self, any_failed: bool) -> Option<PeerAction> {
        let mut healthy = self
            .healthy
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *healthy && any_failed {
            *healthy = false;
            Some(PeerAction::Fail)
        } else if !*healthy && !any_failed {
            *healthy = true;
            Some(PeerAction::Recover)
        } else {
            None
        }
    }
}
