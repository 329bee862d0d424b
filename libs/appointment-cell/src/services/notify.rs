use tracing::{info, warn};

use notification_cell::{format_booking_confirmation, BookingConfirmation, MessagingClient};

use crate::models::{Booking, NotificationOutcome};

pub fn confirmation_text(booking: &Booking) -> Option<String> {
    let doctor_name = booking.doctor_name.as_deref()?;

    Some(format_booking_confirmation(&BookingConfirmation {
        booking_id: &booking.id,
        patient_name: &booking.patient_name,
        doctor_name,
        specialization: booking.specialization.as_deref(),
        date: booking.appointment_date,
        time: &booking.appointment_time,
        consultation_fee: booking.payment.consultation_fee,
        remaining_amount: booking.payment.remaining_amount,
    }))
}

/// Send the assignment confirmation. Failures are logged and reported in the
/// outcome; they never fail the booking update.
pub async fn send_confirmation(messenger: &dyn MessagingClient, booking: &Booking) -> NotificationOutcome {
    let Some(phone) = booking.patient_phone.as_deref().filter(|p| !p.trim().is_empty()) else {
        info!("Booking {} has no patient phone; confirmation skipped", booking.id);
        return NotificationOutcome::Skipped {
            reason: "No patient phone number on booking".to_string(),
        };
    };

    let Some(text) = confirmation_text(booking) else {
        return NotificationOutcome::Skipped {
            reason: "No doctor assigned".to_string(),
        };
    };

    match messenger.send_text(phone, &text).await {
        Ok(receipt) => {
            info!("Confirmation for booking {} sent to {}", booking.id, receipt.destination);
            NotificationOutcome::Sent {
                provider_message_id: receipt.provider_message_id,
            }
        }
        Err(e) => {
            warn!("Confirmation for booking {} not delivered: {}", booking.id, e);
            NotificationOutcome::Failed {
                provider_code: e.provider_code(),
                error: e.to_string(),
            }
        }
    }
}
