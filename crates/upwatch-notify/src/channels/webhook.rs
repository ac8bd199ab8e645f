use crate::plugin::ChannelPlugin;
use crate::NotificationChannel;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;
use upwatch_common::types::{Alert, Service};

const SEND_TIMEOUT_SECS: u64 = 10;

/// Generic webhook channel: POSTs the alert as JSON (or a rendered body
/// template) to a configured URL. A 2xx response counts as delivered.
pub struct WebhookChannel {
    instance_id: String,
    url: String,
    body_template: Option<String>,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(instance_id: &str, url: String, body_template: Option<String>) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            url,
            body_template,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    fn render_body(&self, alert: &Alert, service: &Service) -> String {
        if let Some(template) = &self.body_template {
            template
                .replace("{{service}}", &service.name)
                .replace("{{service_id}}", &service.id)
                .replace("{{alert_type}}", &alert.alert_type.to_string())
                .replace("{{severity}}", &alert.severity.to_string())
                .replace("{{message}}", &alert.message)
                .replace("{{timestamp}}", &alert.created_at.to_rfc3339())
        } else {
            serde_json::json!({
                "alert_id": alert.id,
                "service_id": service.id,
                "service": service.name,
                "alert_type": alert.alert_type.to_string(),
                "severity": alert.severity.to_string(),
                "message": alert.message,
                "timestamp": alert.created_at.to_rfc3339(),
            })
            .to_string()
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn channel_type(&self) -> &str {
        "webhook"
    }

    fn validate_configuration(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    async fn send_alert(&self, alert: &Alert, service: &Service) -> Result<bool> {
        let body = self.render_body(alert, service);
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                instance_id = %self.instance_id,
                status = %status,
                "Webhook returned non-success status"
            );
        }
        Ok(status.is_success())
    }
}

// Plugin

#[derive(Deserialize)]
struct WebhookConfig {
    url: String,
    body_template: Option<String>,
}

pub struct WebhookPlugin;

impl ChannelPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        let cfg: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid webhook config: {e}"))?;
        if cfg.url.is_empty() {
            return Err(anyhow::anyhow!("Invalid webhook config: url is empty"));
        }
        Ok(())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
    ) -> Result<Box<dyn NotificationChannel>> {
        let cfg: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| anyhow::anyhow!("Invalid webhook config: {e}"))?;
        Ok(Box::new(WebhookChannel::new(
            instance_id,
            cfg.url,
            cfg.body_template,
        )))
    }
}
