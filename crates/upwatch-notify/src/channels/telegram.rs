use crate::plugin::ChannelPlugin;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;
use upwatch_common::types::{Alert, AlertType, Service};

const SEND_TIMEOUT_SECS: u64 = 10;

/// Telegram bot channel: pushes alerts through the bot API `sendMessage`
/// endpoint to a configured chat.
pub struct TelegramChannel {
    instance_id: String,
    bot_token: String,
    chat_id: String,
    enabled: bool,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(instance_id: &str, bot_token: String, chat_id: String, enabled: bool) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            bot_token,
            chat_id,
            enabled,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    fn format_message(alert: &Alert, service: &Service) -> String {
        let marker = match alert.alert_type {
            AlertType::Recovery => "✅",
            _ => "🔴",
        };
        format!(
            "{marker} <b>{}</b> [{}]\n{}\n{}",
            service.name,
            alert.severity,
            alert.message,
            alert.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn channel_type(&self) -> &str {
        "telegram"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn validate_configuration(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }

    async fn send_alert(&self, alert: &Alert, service: &Service) -> Result<bool> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": Self::format_message(alert, service),
                "parse_mode": "HTML",
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                instance_id = %self.instance_id,
                status = %status,
                body = %body,
                "Telegram sendMessage failed"
            );
        }
        Ok(status.is_success())
    }
}

// Plugin

#[derive(Deserialize)]
struct TelegramConfig {
    bot_token: String,
    chat_id: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub struct TelegramPlugin;

impl ChannelPlugin for TelegramPlugin {
    fn name(&self) -> &str {
        "telegram"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let cfg: TelegramConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid telegram config: {e}"))?;
        if cfg.bot_token.is_empty() || cfg.chat_id.is_empty() {
            return Err(anyhow::anyhow!(
                "Invalid telegram config: bot_token and chat_id are required"
            ));
        }
        Ok(())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let cfg: TelegramConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid telegram config: {e}"))?;
        Ok(Box::new(TelegramChannel::new(
            instance_id,
            cfg.bot_token,
            cfg.chat_id,
            cfg.enabled,
        )))
    }

    fn redact_config(&self, config: &Value) -> Value {
        let mut redacted = config.clone();
        if let Some(obj) = redacted.as_object_mut() {
            if obj.contains_key("bot_token") {
                obj.insert("bot_token".to_string(), Value::String("***".to_string()));
            }
        }
        redacted
    }
}
