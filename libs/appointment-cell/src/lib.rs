//! Appointment booking and slot ownership.
//!
//! A booking holds at most one slot record per (owner, date, time) key, where
//! the owner is the assigned doctor or `PENDING`. Slot records only change
//! inside store transactions run by [`services::SlotReassigner`].

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{AppointmentError, Booking, BookingStatus};
pub use router::appointment_routes;
pub use services::BookingService;
