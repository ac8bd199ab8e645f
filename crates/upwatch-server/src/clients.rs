use crate::config::HttpClientConfig;
use anyhow::Result;
use std::time::Duration;

/// Pre-configured `reqwest` clients, one per outbound concern.
///
/// The engine never builds an ad-hoc client; it requests one by logical
/// name so timeout policy stays in configuration. Health-check requests
/// additionally override the client timeout with the monitor's own.
pub struct HttpClientFactory {
    health_check: reqwest::Client,
    peer_heartbeat: reqwest::Client,
    peer_notification: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        Ok(Self {
            health_check: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.health_check_timeout_secs))
                .build()?,
            peer_heartbeat: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.peer_heartbeat_timeout_secs))
                .build()?,
            peer_notification: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.peer_notification_timeout_secs))
                .build()?,
        })
    }

    /// Looks a client up by its logical name.
    pub fn get(&self, name: &str) -> Option<&reqwest::Client> {
        match name {
            "HealthCheck" => Some(&self.health_check),
            "PeerHeartbeat" => Some(&self.peer_heartbeat),
            "PeerNotification" => Some(&self.peer_notification),
            _ => None,
        }
    }

    pub fn health_check(&self) -> &reqwest::Client {
        &self.health_check
    }

    pub fn peer_heartbeat(&self) -> &reqwest::Client {
        &self.peer_heartbeat
    }

    pub fn peer_notification(&self) -> &reqwest::Client {
        &self.peer_notification
    }
}
