//! Pairing handshake between two instances.
//!
//! The flow is driven by a human copying one opaque token:
//! 1. `initiate` on instance A mints a single-use secret and wraps
//!    `{url, name, secret, expires_at}` into a base64 token.
//! 2. The operator pastes the token into instance B; `complete` decodes it
//!    and presents the secret to A's `/pair/accept`.
//! 3. `accept` on A consumes the secret, creates its Service+Peer for B
//!    and returns fresh bearer tokens for B's pushes.
//!
//! Secrets and tokens are unauthenticated bearer strings; the secret
//! itself is the credential for the accept/unpair endpoints.

use crate::config::PairingConfig;
use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use upwatch_common::events::{DomainEvent, EventBroadcaster};
use upwatch_common::types::{AlertType, Peer, Service, Severity};
use upwatch_engine::state::StateMachine;
use upwatch_store::Store;

/// The opaque bundle handed to the operator, base64 over JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingToken {
    pub url: String,
    pub name: String,
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

impl PairingToken {
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(general_purpose::STANDARD.encode(json))
    }

    pub fn decode(token: &str) -> Result<Self> {
        let json = general_purpose::STANDARD
            .decode(token)
            .context("pairing token is not valid base64")?;
        serde_json::from_slice(&json).context("pairing token payload is not valid")
    }
}

/// What `accept` sends back to the caller: the credentials it must use
/// when pushing to this instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingResponse {
    pub heartbeat_token: String,
    pub webhook_token: String,
    pub heartbeat_interval_secs: u64,
}

/// What the accepting side receives: the initiator's secret plus enough
/// identity to create the reciprocal peer record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairAcceptRequest {
    pub secret: String,
    pub url: String,
    pub name: String,
}

/// Generates a 32-byte cryptographically random hex secret.
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    let mut s = String::with_capacity(64);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generates a 32-byte random bearer token, base64-encoded.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    general_purpose::STANDARD.encode(bytes)
}

pub struct PairingManager {
    store: Arc<dyn Store>,
    state: Arc<StateMachine>,
    broadcaster: Arc<dyn EventBroadcaster>,
    client: reqwest::Client,
    config: PairingConfig,
    /// Outstanding pairing secrets with their expiry. Single-writer:
    /// only initiate/validate touch this, both short critical sections.
    secrets: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl PairingManager {
    pub fn new(
        store: Arc<dyn Store>,
        state: Arc<StateMachine>,
        broadcaster: Arc<dyn EventBroadcaster>,
        client: reqwest::Client,
        config: PairingConfig,
    ) -> Self {
        Self {
            store,
            state,
            broadcaster,
            client,
            config,
            secrets: Mutex::new(HashMap::new()),
        }
    }

    /// Step 1 (instance A): mints a secret and returns the operator token.
    pub fn initiate(&self) -> Result<String> {
        let now = Utc::now();
        let secret = generate_secret();
        let expires_at = now + Duration::seconds(self.config.secret_ttl_secs as i64);

        let mut secrets = self.secrets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        secrets.retain(|_, expiry| *expiry > now);
        secrets.insert(secret.clone(), expires_at);
        drop(secrets);

        info!(expires_at = %expires_at, "Pairing initiated");
        PairingToken {
            url: self.config.url.clone(),
            name: self.config.name.clone(),
            secret,
            expires_at,
        }
        .encode()
    }

    /// Consumes the secret. Returns true exactly once per unexpired secret;
    /// a second validation, or an expired one, returns false.
    pub fn validate_secret(&self, secret: &str) -> bool {
        let mut secrets = self.secrets.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match secrets.remove(secret) {
            Some(expiry) => expiry > Utc::now(),
            None => false,
        }
    }

    /// Step 2 (instance A, called by B with the secret): validates and
    /// creates this side's Service+Peer for the caller, returning the
    /// bearer tokens the caller must push with.
    pub async fn accept(&self, request: &PairAcceptRequest) -> Result<PairingResponse> {
        if !self.validate_secret(&request.secret) {
            warn!(remote = %request.url, "Pairing accept with invalid or expired secret");
            anyhow::bail!("invalid or expired pairing secret");
        }

        let response = PairingResponse {
            heartbeat_token: generate_token(),
            webhook_token: generate_token(),
            heartbeat_interval_secs: self.config.heartbeat_interval_secs,
        };
        self.create_peer(
            &request.name,
            &request.url,
            &response.heartbeat_token,
            &response.webhook_token,
            response.heartbeat_interval_secs,
        )
        .await?;
        Ok(response)
    }

    /// Step 3 (instance B): decodes the operator-pasted token, presents the
    /// secret to the remote `/pair/accept` and stores the returned peer.
    pub async fn complete(&self, token: &str) -> Result<Peer> {
        let token = PairingToken::decode(token)?;
        if token.expires_at <= Utc::now() {
            anyhow::bail!("pairing token expired at {}", token.expires_at);
        }

        let url = format!("{}/pair/accept", token.url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&PairAcceptRequest {
                secret: token.secret.clone(),
                url: self.config.url.clone(),
                name: self.config.name.clone(),
            })
            .send()
            .await
            .with_context(|| format!("pair accept call to {url} failed"))?;
        if !response.status().is_success() {
            anyhow::bail!("pair accept rejected by {}: {}", token.url, response.status());
        }
        let grant: PairingResponse = response.json().await?;

        self.create_peer(
            &token.name,
            &token.url,
            &grant.heartbeat_token,
            &grant.webhook_token,
            grant.heartbeat_interval_secs,
        )
        .await
    }

    /// Deletes the peer addressed by its webhook token, along with the
    /// local service representing it. Returns false when no peer matches.
    pub async fn unpair(&self, webhook_token: &str) -> Result<bool> {
        let Some(peer) = self.store.get_peer_by_webhook_token(webhook_token).await? else {
            return Ok(false);
        };
        self.store.delete_peer(&peer.id).await?;
        self.store.delete_service(&peer.service_id).await?;
        info!(peer = %peer.name, "Peer unpaired");
        Ok(true)
    }

    /// Inbound liveness ping from a peer: transitions its local service Up.
    /// Returns false for an unknown token.
    pub async fn heartbeat_received(&self, heartbeat_token: &str) -> Result<bool> {
        let Some(peer) = self.store.get_peer_by_heartbeat_token(heartbeat_token).await? else {
            return Ok(false);
        };
        self.state
            .transition_to_up(&peer.service_id, "Peer heartbeat received")
            .await?;
        Ok(true)
    }

    /// Inbound dispatch-health webhook from a peer.
    pub async fn webhook_action(&self, webhook_token: &str, action: &str) -> Result<bool> {
        let Some(peer) = self.store.get_peer_by_webhook_token(webhook_token).await? else {
            return Ok(false);
        };
        match action {
            "fail" => {
                self.state
                    .transition_to_down(
                        &peer.service_id,
                        AlertType::Failure,
                        "Peer reported alert dispatch failure",
                    )
                    .await?;
            }
            "recover" => {
                self.state
                    .transition_to_up(&peer.service_id, "Peer reported alert dispatch recovery")
                    .await?;
            }
            other => anyhow::bail!("unknown peer webhook action: {other}"),
        }
        Ok(true)
    }

    async fn create_peer(
        &self,
        name: &str,
        url: &str,
        heartbeat_token: &str,
        webhook_token: &str,
        heartbeat_interval_secs: u64,
    ) -> Result<Peer> {
        let service = Service::new(name, Severity::Medium);
        self.store.add_service(service.clone()).await?;

        let now = Utc::now();
        let peer = Peer {
            id: upwatch_common::id::next_id(),
            service_id: service.id.clone(),
            name: name.to_string(),
            url: url.trim_end_matches('/').to_string(),
            heartbeat_token: heartbeat_token.to_string(),
            webhook_token: webhook_token.to_string(),
            heartbeat_interval_secs,
            paired_at: now,
            created_at: now,
        };
        self.store.add_peer(peer.clone()).await?;
        info!(peer = %peer.name, url = %peer.url, "Peer paired");
        self.broadcaster.publish(DomainEvent::PeerPaired {
            peer_id: peer.id.clone(),
            name: peer.name.clone(),
            at: now,
        });
        Ok(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upwatch_common::events::NoopBroadcaster;
    use upwatch_store::memory::MemoryStore;
    use upwatch_store::PeerStore;

    fn manager(store: Arc<MemoryStore>) -> PairingManager {
        let state = Arc::new(StateMachine::new(store.clone(), Arc::new(NoopBroadcaster)));
        PairingManager::new(
            store,
            state,
            Arc::new(NoopBroadcaster),
            reqwest::Client::new(),
            PairingConfig::default(),
        )
    }

    #[test]
    fn pairing_token_round_trips_through_base64() {
        let token = PairingToken {
            url: "https://mon.example.com".into(),
            name: "primary".into(),
            secret: "s3cret".into(),
            expires_at: Utc::now() + Duration::minutes(10),
        };
        let encoded = token.encode().unwrap();
        let decoded = PairingToken::decode(&encoded).unwrap();
        assert_eq!(decoded.url, token.url);
        assert_eq!(decoded.secret, token.secret);
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(PairingToken::decode("not-base64!!!").is_err());
        let junk = general_purpose::STANDARD.encode(b"{\"not\": \"a token\"}");
        assert!(PairingToken::decode(&junk).is_err());
    }

    #[tokio::test]
    async fn secret_is_single_use() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store);
        let token = PairingToken::decode(&mgr.initiate().unwrap()).unwrap();

        assert!(mgr.validate_secret(&token.secret));
        assert!(!mgr.validate_secret(&token.secret), "second use must fail");
    }

    #[tokio::test]
    async fn expired_secret_validates_false() {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(StateMachine::new(store.clone(), Arc::new(NoopBroadcaster)));
        let mgr = PairingManager::new(
            store,
            state,
            Arc::new(NoopBroadcaster),
            reqwest::Client::new(),
            PairingConfig {
                secret_ttl_secs: 0,
                ..PairingConfig::default()
            },
        );
        let token = PairingToken::decode(&mgr.initiate().unwrap()).unwrap();
        assert!(!mgr.validate_secret(&token.secret));
    }

    #[tokio::test]
    async fn unknown_secret_validates_false() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store);
        assert!(!mgr.validate_secret("never-issued"));
    }

    #[tokio::test]
    async fn accept_creates_service_and_peer() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store.clone());
        let token = PairingToken::decode(&mgr.initiate().unwrap()).unwrap();

        let grant = mgr
            .accept(&PairAcceptRequest {
                secret: token.secret,
                url: "https://remote.example.com/".into(),
                name: "secondary".into(),
            })
            .await
            .unwrap();
        assert!(!grant.heartbeat_token.is_empty());
        assert_ne!(grant.heartbeat_token, grant.webhook_token);

        let peers = store.list_peers().await.unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].name, "secondary");
        assert_eq!(peers[0].url, "https://remote.example.com");
    }

    #[tokio::test]
    async fn accept_with_consumed_secret_fails() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store.clone());
        let token = PairingToken::decode(&mgr.initiate().unwrap()).unwrap();
        assert!(mgr.validate_secret(&token.secret));

        let result = mgr
            .accept(&PairAcceptRequest {
                secret: token.secret,
                url: "https://remote.example.com".into(),
                name: "secondary".into(),
            })
            .await;
        assert!(result.is_err());
        assert!(store.list_peers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unpair_removes_peer_and_service() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store.clone());
        let token = PairingToken::decode(&mgr.initiate().unwrap()).unwrap();
        let _ = mgr
            .accept(&PairAcceptRequest {
                secret: token.secret,
                url: "https://remote.example.com".into(),
                name: "secondary".into(),
            })
            .await
            .unwrap();
        let peer = store.list_peers().await.unwrap().remove(0);

        assert!(mgr.unpair(&peer.webhook_token).await.unwrap());
        assert!(store.list_peers().await.unwrap().is_empty());
        assert!(!mgr.unpair(&peer.webhook_token).await.unwrap());
    }
}
