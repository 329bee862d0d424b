use async_trait::async_trait;
use tracing::info;

use crate::models::{DeliveryReceipt, DependencyError};

/// Outbound text messaging. Implementations report failure through the
/// returned error and never panic into the caller.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, DependencyError>;
}

/// Stand-in used when no provider is configured: the message is only logged.
#[derive(Debug, Default, Clone)]
pub struct LogOnlyMessenger {
    default_country_code: String,
}

impl LogOnlyMessenger {
    pub fn new(default_country_code: &str) -> Self {
        Self {
            default_country_code: default_country_code.to_string(),
        }
    }
}

#[async_trait]
impl MessagingClient for LogOnlyMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, DependencyError> {
        let destination = normalize_destination(to, &self.default_country_code)?;
        info!("Messaging disabled; would send to {}: {}", destination, body);
        Ok(DeliveryReceipt {
            destination,
            provider_message_id: None,
        })
    }
}

/// Reduce a typed phone number to the digits-only international form the
/// provider expects. Ten-digit local numbers get the default country code.
pub fn normalize_destination(raw: &str, default_country_code: &str) -> Result<String, DependencyError> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    let number = if trimmed.starts_with('+') {
        digits
    } else if let Some(rest) = digits.strip_prefix("00") {
        rest.to_string()
    } else if digits.len() == 11 && digits.starts_with('0') {
        format!("{}{}", default_country_code, &digits[1..])
    } else if digits.len() == 10 {
        format!("{}{}", default_country_code, digits)
    } else {
        digits
    };

    if !(8..=15).contains(&number.len()) {
        return Err(DependencyError::InvalidDestination(raw.to_string()));
    }
    Ok(number)
}
