// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, BookingStatus, PaymentDetails};

#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Check a status change. Returns `false` when `new_status` equals the
    /// current status and there is nothing to do.
    pub fn validate_status_transition(
        &self,
        current_status: BookingStatus,
        new_status: BookingStatus,
        payment: &PaymentDetails,
    ) -> Result<bool, AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if current_status == new_status {
            return Ok(false);
        }

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        if new_status == BookingStatus::RefundRequested && payment.paid_amount <= 0.0 {
            return Err(AppointmentError::Validation(
                "A refund can only be requested for a paid appointment".to_string(),
            ));
        }

        Ok(true)
    }

    /// All valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: BookingStatus) -> Vec<BookingStatus> {
        match current_status {
            BookingStatus::Pending | BookingStatus::WhatsappPending => {
                vec![BookingStatus::Confirmed, BookingStatus::Cancelled]
            }
            BookingStatus::Confirmed => vec![
                BookingStatus::Completed,
                BookingStatus::Cancelled,
                BookingStatus::RefundRequested,
            ],
            // Terminal states - no transitions allowed
            BookingStatus::Completed => vec![],
            BookingStatus::Cancelled => vec![],
            BookingStatus::RefundRequested => vec![],
        }
    }
}
