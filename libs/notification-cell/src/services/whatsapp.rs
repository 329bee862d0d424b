use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{
    DeliveryReceipt, DependencyError, WhatsAppErrorEnvelope, WhatsAppSendResponse, WhatsAppTextRequest,
};
use crate::services::messenger::{normalize_destination, MessagingClient};

/// WhatsApp Cloud API client for plain text messages.
/// POST {base_url}/{phone_number_id}/messages
pub struct WhatsAppClient {
    client: Client,
    base_url: String,
    access_token: String,
    phone_number_id: String,
    default_country_code: String,
}

impl WhatsAppClient {
    pub fn new(config: &AppConfig) -> Result<Self, DependencyError> {
        if !config.is_messaging_configured() {
            return Err(DependencyError::NotConfigured);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.whatsapp_timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            base_url: config.whatsapp_api_url.trim_end_matches('/').to_string(),
            access_token: config.whatsapp_access_token.clone(),
            phone_number_id: config.whatsapp_phone_number_id.clone(),
            default_country_code: config.default_country_code.clone(),
        })
    }
}

#[async_trait]
impl MessagingClient for WhatsAppClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, DependencyError> {
        let destination = normalize_destination(to, &self.default_country_code)?;
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);

        debug!("Sending WhatsApp message to {} via {}", destination, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&WhatsAppTextRequest::new(destination.clone(), body))
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("WhatsApp send failed: {} - {}", status, response_text);
            return Err(match serde_json::from_str::<WhatsAppErrorEnvelope>(&response_text) {
                Ok(envelope) => DependencyError::Provider {
                    code: envelope.error.code,
                    message: envelope.error.message,
                },
                Err(_) => DependencyError::Provider {
                    code: None,
                    message: format!("HTTP {}: {}", status, response_text),
                },
            });
        }

        let parsed: WhatsAppSendResponse = serde_json::from_str(&response_text).map_err(|e| {
            DependencyError::Transport(format!("Failed to parse send response: {}", e))
        })?;

        let provider_message_id = parsed.messages.into_iter().next().map(|m| m.id);
        info!("WhatsApp message delivered to {}", destination);

        Ok(DeliveryReceipt {
            destination,
            provider_message_id,
        })
    }
}
