use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};
use upwatch_common::types::Peer;
use upwatch_store::Store;

/// Dispatch-health action pushed to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerAction {
    Fail,
    Recover,
}

impl std::fmt::Display for PeerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerAction::Fail => write!(f, "fail"),
            PeerAction::Recover => write!(f, "recover"),
        }
    }
}

/// Outbound push client for paired instances. Both calls are time-bounded
/// by their client's configured timeout and are never retried within a
/// pass — the next scheduled pass is the retry.
pub struct PeerNotifier {
    store: Arc<dyn Store>,
    heartbeat_client: reqwest::Client,
    notification_client: reqwest::Client,
}

impl PeerNotifier {
    pub fn new(
        store: Arc<dyn Store>,
        heartbeat_client: reqwest::Client,
        notification_client: reqwest::Client,
    ) -> Self {
        Self {
            store,
            heartbeat_client,
            notification_client,
        }
    }

    /// POSTs a liveness ping to the peer's heartbeat endpoint.
    pub async fn send_heartbeat(&self, peer: &Peer) -> Result<()> {
        let url = format!(
            "{}/heartbeat/{}",
            peer.url.trim_end_matches('/'),
            peer.heartbeat_token
        );
        let response = self.heartbeat_client.post(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("peer heartbeat returned {}", response.status());
        }
        debug!(peer = %peer.name, "Peer heartbeat sent");
        Ok(())
    }

    /// POSTs a dispatch-health change to one peer's webhook endpoint.
    pub async fn notify_dispatch_health(&self, peer: &Peer, action: PeerAction) -> Result<()> {
        let url = format!(
            "{}/webhook/{}/{}",
            peer.url.trim_end_matches('/'),
            peer.webhook_token,
            action
        );
        let response = self.notification_client.post(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("peer webhook returned {}", response.status());
        }
        debug!(peer = %peer.name, action = %action, "Peer dispatch-health notified");
        Ok(())
    }

    /// Fans a dispatch-health change out to every paired instance.
    /// Individual failures are logged and abandoned.
    pub async fn notify_all(&self, action: PeerAction) {
        let peers = match self.store.list_peers().await {
            Ok(peers) => peers,
            Err(e) => {
                warn!(error = %e, "Failed to list peers for dispatch-health push");
                return;
            }
        };
        for peer in peers {
            if let Err(e) = self.notify_dispatch_health(&peer, action).await {
                warn!(peer = %peer.name, action = %action, error = %e, "Peer notification failed");
            }
        }
    }
}
