pub mod messenger;
pub mod templates;
pub mod whatsapp;

pub use messenger::{normalize_destination, LogOnlyMessenger, MessagingClient};
pub use templates::{format_booking_confirmation, BookingConfirmation};
pub use whatsapp::WhatsAppClient;
