//! Notification delivery framework with pluggable channel support.
//!
//! Alerts are fanned out to every [`NotificationChannel`] resolved for the
//! owning service's contacts. Built-in channels are Telegram and generic
//! webhook; new channel types implement the contract and register a
//! [`plugin::ChannelPlugin`] — the dispatcher never branches on a type
//! enum.

pub mod channels;
pub mod dispatcher;
pub mod plugin;


use anyhow::Result;
use async_trait::async_trait;
use upwatch_common::types::{Alert, Service};

/// A notification delivery channel sending alerts to an external service.
///
/// Implementations are created by the corresponding [`plugin::ChannelPlugin`]
/// from a contact channel's JSON config.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Returns the channel type name (e.g., `"telegram"`, `"webhook"`).
    fn channel_type(&self) -> &str;

    /// Disabled channels are resolved but never attempted.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Cheap self-check of the configured credentials/targets. A channel
    /// failing this counts as a failed send attempt, not a crash.
    fn validate_configuration(&self) -> bool;

    /// Delivers the alert. `Ok(false)` and `Err(_)` both count as a failed
    /// attempt; the dispatcher retries the whole alert on its next pass.
    async fn send_alert(&self, alert: &Alert, service: &Service) -> Result<bool>;
}
