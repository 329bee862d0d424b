//! Outbound patient messaging.
//!
//! The booking core only sees [`MessagingClient`]; the binary picks
//! [`WhatsAppClient`] when the WhatsApp Cloud API is configured and
//! [`LogOnlyMessenger`] otherwise.

use std::sync::Arc;

use tracing::warn;

use shared_config::AppConfig;

pub mod models;
pub mod services;

pub use models::{DeliveryReceipt, DependencyError};
pub use services::{
    format_booking_confirmation, normalize_destination, BookingConfirmation, LogOnlyMessenger, MessagingClient,
    WhatsAppClient,
};

/// Pick the messenger for this process from configuration.
pub fn messenger_from_config(config: &AppConfig) -> Arc<dyn MessagingClient> {
    match WhatsAppClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("{}; confirmations will only be logged", e);
            Arc::new(LogOnlyMessenger::new(&config.default_country_code))
        }
    }
}
