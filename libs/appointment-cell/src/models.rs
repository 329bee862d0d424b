// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use doctor_cell::DoctorError;
use shared_database::StoreError;

use crate::services::slot_key::{SlotClaim, SlotOwner};

pub const APPOINTMENTS_COLLECTION: &str = "appointments";
pub const SLOTS_COLLECTION: &str = "slots";

// ==============================================================================
// CORE BOOKING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub hospital_id: Option<String>,
    pub patient_id: Option<String>,
    // Copied from the patient profile at intake; not kept in sync afterwards
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
    pub specialization: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub status: BookingStatus,
    pub source: BookingSource,
    pub pending_assignment: bool,
    pub notes: Option<String>,
    pub payment: PaymentDetails,
    pub cancellation_reason: Option<String>,
    /// Bumped on every committed write. Writers check it to detect that the
    /// booking changed since they read it.
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// The slot this booking's current doctor/date/time maps to.
    pub fn slot_claim(&self) -> SlotClaim {
        SlotClaim::from_stored(
            SlotOwner::for_doctor(self.doctor_id.as_deref()),
            self.appointment_date,
            &self.appointment_time,
        )
    }

    /// Every slot record this booking may still own: the doctor slot and,
    /// while it is awaiting assignment, the PENDING slot for the same time.
    pub fn held_claims(&self) -> Vec<SlotClaim> {
        let mut claims = vec![self.slot_claim()];
        if self.doctor_id.is_some() && self.pending_assignment {
            claims.push(SlotClaim::from_stored(
                SlotOwner::Pending,
                self.appointment_date,
                &self.appointment_time,
            ));
        }
        claims
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    WhatsappPending,
    Confirmed,
    Completed,
    Cancelled,
    RefundRequested,
}

impl BookingStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::WhatsappPending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::RefundRequested
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::WhatsappPending => write!(f, "whatsapp_pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
            BookingStatus::RefundRequested => write!(f, "refund_requested"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    #[default]
    Web,
    Whatsapp,
    Reception,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    Online,
    Insurance,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentDetails {
    pub consultation_fee: f64,
    pub paid_amount: f64,
    pub remaining_amount: f64,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
}

impl PaymentDetails {
    pub fn new(consultation_fee: f64, paid_amount: f64, payment_method: Option<PaymentMethod>) -> Self {
        let mut payment = Self {
            consultation_fee,
            paid_amount,
            remaining_amount: 0.0,
            payment_method,
            payment_status: PaymentStatus::Unpaid,
        };
        payment.recompute();
        payment
    }

    /// remaining = max(fee - paid, 0)
    pub fn recompute(&mut self) {
        self.remaining_amount = (self.consultation_fee - self.paid_amount).max(0.0);
        self.payment_status = if self.paid_amount <= 0.0 {
            PaymentStatus::Unpaid
        } else if self.remaining_amount > 0.0 {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Paid
        };
    }
}

/// Reservation marker stored under the slot key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotRecord {
    pub appointment_id: String,
    pub owner: String,
    pub date: NaiveDate,
    pub time: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub hospital_id: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: String,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub doctor_id: Option<String>,
    pub appointment_date: String,
    pub appointment_time: String,
    #[serde(default)]
    pub source: BookingSource,
    pub notes: Option<String>,
    pub consultation_fee: Option<f64>,
    pub paid_amount: Option<f64>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBookingRequest {
    pub doctor_id: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub notes: Option<String>,
    pub consultation_fee: Option<f64>,
    pub paid_amount: Option<f64>,
    pub payment_method: Option<PaymentMethod>,
    pub status: Option<BookingStatus>,
    #[serde(default = "default_send_notification")]
    pub send_notification: bool,
}

fn default_send_notification() -> bool {
    true
}

impl Default for UpdateBookingRequest {
    fn default() -> Self {
        Self {
            doctor_id: None,
            appointment_date: None,
            appointment_time: None,
            patient_name: None,
            patient_phone: None,
            patient_email: None,
            notes: None,
            consultation_fee: None,
            paid_amount: None,
            payment_method: None,
            status: None,
            send_notification: default_send_notification(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusChangeRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingListQuery {
    pub hospital_id: Option<String>,
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub date: Option<String>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotCheckQuery {
    pub doctor_id: Option<String>,
    pub date: String,
    pub time: String,
    pub appointment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotCheckResponse {
    pub slot_key: String,
    pub available: bool,
}

/// How the slot records moved during an update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum SlotChange {
    Unchanged,
    Moved { released: Vec<String>, claimed: String },
    Released { released: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationOutcome {
    NotRequested,
    Sent { provider_message_id: Option<String> },
    Skipped { reason: String },
    Failed { error: String, provider_code: Option<i64> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBookingOutcome {
    pub appointment: Booking,
    pub slot: SlotChange,
    pub notification: NotificationOutcome,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    /// The resource exists but belongs to another hospital.
    #[error("Appointment not found")]
    HospitalScope,

    #[error("Time slot already booked")]
    SlotConflict { slot_key: String },

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition { from: BookingStatus, to: BookingStatus },

    #[error("Appointment is {0} and can no longer be rescheduled")]
    NotReschedulable(BookingStatus),

    /// The stored booking moved past the revision an edit was planned from.
    #[error("Appointment {booking_id} was changed by another request")]
    StaleBooking { booking_id: String },

    #[error("Dependency error: {0}")]
    Dependency(String),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::ValidationError(msg) => AppointmentError::Validation(msg),
            other => AppointmentError::Dependency(other.to_string()),
        }
    }
}
