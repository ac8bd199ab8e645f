use crate::peer::PeerNotifier;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use upwatch_store::Store;

/// Pushes liveness heartbeats to paired instances.
///
/// Each peer has its own cadence (`heartbeat_interval_secs`), tracked in a
/// task-owned last-sent map independent of this task's tick. A failed push
/// is logged and waits for the peer's next due time — never retried
/// within the pass.
pub struct PeerHeartbeatScheduler {
    store: Arc<dyn Store>,
    notifier: Arc<PeerNotifier>,
    tick_secs: u64,
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl PeerHeartbeatScheduler {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<PeerNotifier>, tick_secs: u64) -> Self {
        Self {
            store,
            notifier,
            tick_secs,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(tick_secs = self.tick_secs, "Peer heartbeat scheduler started");
        let mut tick = interval(tokio::time::Duration::from_secs(self.tick_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Peer heartbeat scheduler stopped");
                    break;
                }
                _ = tick.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::info!("Peer heartbeat scheduler stopped");
                            break;
                        }
                        result = self.pass() => {
                            if let Err(e) = result {
                                tracing::error!(error = %e, "Peer heartbeat pass failed");
                            }
                        }
                    }
                }
            }
        }
    }

    pub async fn pass(&self) -> Result<()> {
        let peers = self.store.list_peers().await?;
        let now = Utc::now();

        let due: Vec<_> = {
            let last_sent = self.last_sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            peers
                .iter()
                .filter(|peer| {
                    last_sent.get(&peer.id).map_or(true, |last| {
                        (now - *last).num_seconds() >= peer.heartbeat_interval_secs as i64
                    })
                })
                .cloned()
                .collect()
        };

        for peer in due {
            if let Err(e) = self.notifier.send_heartbeat(&peer).await {
                tracing::warn!(peer = %peer.name, error = %e, "Peer heartbeat failed");
            }
            // The attempt counts regardless of outcome; the next send waits
            // for the peer's own interval.
            self.last_sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).insert(peer.id.clone(), now);
        }

        // Drop bookkeeping for unpaired peers.
        let mut last_sent = self.last_sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        last_sent.retain(|id, _| peers.iter().any(|p| &p.id == id));
        Ok(())
    }
}
