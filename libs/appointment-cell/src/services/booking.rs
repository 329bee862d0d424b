// libs/appointment-cell/src/services/booking.rs
use std::future::Future;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::{DoctorDirectory, DoctorSnapshot};
use notification_cell::MessagingClient;
use shared_database::{fetch, from_document, DocumentStore};

use crate::models::{
    AppointmentError, Booking, BookingListQuery, BookingSource, BookingStatus, CreateBookingRequest,
    NotificationOutcome, PaymentDetails, SlotChange, SlotCheckQuery, SlotCheckResponse, UpdateBookingOutcome,
    UpdateBookingRequest, APPOINTMENTS_COLLECTION,
};
use crate::services::conflict::ConflictChecker;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notify::send_confirmation;
use crate::services::reassign::{SlotMove, SlotReassigner};
use crate::services::slot_key::{normalize_time, parse_date, SlotClaim, SlotOwner, PENDING_OWNER};

pub struct BookingService {
    store: Arc<dyn DocumentStore>,
    directory: Arc<dyn DoctorDirectory>,
    messenger: Arc<dyn MessagingClient>,
    reassigner: SlotReassigner,
    lifecycle: AppointmentLifecycleService,
    max_attempts: u32,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn DoctorDirectory>,
        messenger: Arc<dyn MessagingClient>,
        max_attempts: u32,
    ) -> Self {
        Self {
            reassigner: SlotReassigner::new(Arc::clone(&store), max_attempts),
            store,
            directory,
            messenger,
            lifecycle: AppointmentLifecycleService::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    // ==============================================================================
    // INTAKE
    // ==============================================================================

    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<Booking, AppointmentError> {
        let patient_name = required_text(&request.patient_name, "patient_name")?;
        let date = parse_date(&request.appointment_date)?;
        let time = normalize_time(&request.appointment_time)?;
        let doctor_id = validate_doctor_id(request.doctor_id.as_deref())?;
        let consultation_fee = non_negative(request.consultation_fee, "consultation_fee")?;
        let paid_amount = non_negative(request.paid_amount, "paid_amount")?.unwrap_or(0.0);

        let doctor = match doctor_id.as_deref() {
            Some(id) => Some(self.lookup_doctor(id, request.hospital_id.as_deref()).await?),
            None => None,
        };

        let status = match (&doctor, request.source) {
            (Some(_), _) => BookingStatus::Pending,
            (None, BookingSource::Whatsapp) => BookingStatus::WhatsappPending,
            (None, _) => BookingStatus::Pending,
        };

        let fee = consultation_fee
            .or(doctor.as_ref().map(|d| d.consultation_fee))
            .unwrap_or(0.0);

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            hospital_id: request
                .hospital_id
                .or_else(|| doctor.as_ref().and_then(|d| d.hospital_id.clone())),
            patient_id: request.patient_id,
            patient_name,
            patient_phone: trimmed(request.patient_phone),
            patient_email: trimmed(request.patient_email),
            doctor_id,
            doctor_name: doctor.as_ref().map(|d| d.display_name.clone()),
            specialization: doctor.as_ref().map(|d| d.specialization.clone()),
            appointment_date: date,
            appointment_time: time,
            status,
            source: request.source,
            pending_assignment: doctor.is_none(),
            notes: request.notes,
            payment: PaymentDetails::new(fee, paid_amount, request.payment_method),
            cancellation_reason: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        debug!("Creating booking {} on slot {}", booking.id, booking.slot_claim().key());
        self.reassigner.claim(&booking).await?;

        info!("Booking {} created with status {}", booking.id, booking.status);
        Ok(booking)
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking, AppointmentError> {
        fetch(self.store.as_ref(), APPOINTMENTS_COLLECTION, booking_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn list_bookings(&self, query: &BookingListQuery) -> Result<Vec<Booking>, AppointmentError> {
        let date = query.date.as_deref().map(parse_date).transpose()?;

        let mut bookings = Vec::new();
        for document in self.store.list(APPOINTMENTS_COLLECTION).await? {
            match from_document::<Booking>(document) {
                Ok(booking) if matches_query(&booking, query, date) => bookings.push(booking),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable booking document: {}", e),
            }
        }

        bookings.sort_by(|a, b| {
            (a.appointment_date, &a.appointment_time, a.created_at).cmp(&(
                b.appointment_date,
                &b.appointment_time,
                b.created_at,
            ))
        });

        debug!("Listed {} bookings", bookings.len());
        Ok(bookings)
    }

    pub async fn check_slot(&self, query: &SlotCheckQuery) -> Result<SlotCheckResponse, AppointmentError> {
        let doctor_id = validate_doctor_id(query.doctor_id.as_deref())?;
        let claim = SlotClaim::new(
            SlotOwner::for_doctor(doctor_id.as_deref()),
            parse_date(&query.date)?,
            &query.time,
        )?;
        let slot_key = claim.key();

        let availability = ConflictChecker::peek(self.store.as_ref(), &slot_key, query.appointment_id.as_deref()).await?;

        Ok(SlotCheckResponse {
            slot_key,
            available: availability.is_available(),
        })
    }

    // ==============================================================================
    // UPDATES
    // ==============================================================================

    /// Apply a receptionist edit: doctor assignment, reschedule, contact,
    /// payment and status fields.
    ///
    /// The edit is planned from a fresh read of the booking and everything is
    /// validated before the store transaction runs. That transaction writes
    /// the booking together with its slot records, and only if the booking
    /// is still at the revision the plan was made from; otherwise the edit is
    /// planned again from the newer copy.
    pub async fn update_booking(
        &self,
        booking_id: &str,
        request: UpdateBookingRequest,
    ) -> Result<UpdateBookingOutcome, AppointmentError> {
        let edit = &request;
        let (booking, slot, assigned) = self
            .with_fresh_booking(booking_id, |current| self.apply_update(current, edit))
            .await?;

        info!("Booking {} updated (status {})", booking.id, booking.status);

        let notification = if assigned && request.send_notification {
            send_confirmation(self.messenger.as_ref(), &booking).await
        } else {
            NotificationOutcome::NotRequested
        };

        Ok(UpdateBookingOutcome {
            appointment: booking,
            slot,
            notification,
        })
    }

    async fn apply_update(
        &self,
        current: Booking,
        request: &UpdateBookingRequest,
    ) -> Result<(Booking, SlotChange, bool), AppointmentError> {
        let requested_doctor = match request.doctor_id.as_deref() {
            Some(raw) => Some(
                validate_doctor_id(Some(raw))?
                    .ok_or_else(|| AppointmentError::Validation("doctor_id cannot be empty".to_string()))?,
            ),
            None => None,
        };
        let requested_date = request.appointment_date.as_deref().map(parse_date).transpose()?;
        let requested_time = request.appointment_time.as_deref().map(normalize_time).transpose()?;
        let patient_name = request
            .patient_name
            .as_deref()
            .map(|name| required_text(name, "patient_name"))
            .transpose()?;
        let consultation_fee = non_negative(request.consultation_fee, "consultation_fee")?;
        let paid_amount = non_negative(request.paid_amount, "paid_amount")?;

        let target_doctor = requested_doctor.clone().or_else(|| current.doctor_id.clone());
        let current_claim = current.slot_claim();
        let target = SlotClaim {
            owner: SlotOwner::for_doctor(target_doctor.as_deref()),
            date: requested_date.unwrap_or(current.appointment_date),
            time: requested_time.unwrap_or_else(|| current_claim.time.clone()),
        };
        let target_key = target.key();
        let slot_changing = current.held_claims().iter().any(|held| held.key() != target_key);

        if slot_changing && current.status.is_terminal() {
            return Err(AppointmentError::NotReschedulable(current.status));
        }

        // confirmed always means a doctor is attached
        if request.status == Some(BookingStatus::Confirmed) && target_doctor.is_none() {
            return Err(AppointmentError::Validation(
                "Assign a doctor before confirming the appointment".to_string(),
            ));
        }

        let doctor_changed = requested_doctor.is_some() && requested_doctor != current.doctor_id;
        let snapshot = match target_doctor.as_deref() {
            Some(id) if doctor_changed || current.doctor_name.is_none() => {
                Some(self.lookup_doctor(id, current.hospital_id.as_deref()).await?)
            }
            _ => None,
        };

        let mut payment = current.payment.clone();
        if let Some(fee) = consultation_fee.or(snapshot.as_ref().map(|d| d.consultation_fee)) {
            payment.consultation_fee = fee;
        }
        if let Some(paid) = paid_amount {
            payment.paid_amount = paid;
        }
        if let Some(method) = request.payment_method {
            payment.payment_method = Some(method);
        }
        payment.recompute();

        let assigning =
            requested_doctor.is_some() && (current.pending_assignment || current.status.is_pending());
        let mut status = if assigning && current.status.is_pending() {
            BookingStatus::Confirmed
        } else {
            current.status
        };

        let cancelling = request.status == Some(BookingStatus::Cancelled) && status != BookingStatus::Cancelled;
        if let Some(requested) = request.status {
            self.lifecycle.validate_status_transition(status, requested, &payment)?;
            status = requested;
        }
        if cancelling && slot_changing {
            return Err(AppointmentError::Validation(
                "Cancel the appointment without changing its doctor, date or time".to_string(),
            ));
        }

        let mut booking = current.clone();
        booking.doctor_id = target_doctor;
        if let Some(doctor) = &snapshot {
            booking.doctor_name = Some(doctor.display_name.clone());
            booking.specialization = Some(doctor.specialization.clone());
        }
        booking.appointment_date = target.date;
        booking.appointment_time = target.time.clone();
        if let Some(name) = patient_name {
            booking.patient_name = name;
        }
        if request.patient_phone.is_some() {
            booking.patient_phone = trimmed(request.patient_phone.clone());
        }
        if request.patient_email.is_some() {
            booking.patient_email = trimmed(request.patient_email.clone());
        }
        if request.notes.is_some() {
            booking.notes = request.notes.clone();
        }
        booking.payment = payment;
        if assigning {
            booking.pending_assignment = false;
        }
        booking.status = status;
        touch(&mut booking, &current);

        // Only the booking's own slot records are touched.
        let slot = if cancelling {
            let released = self.reassigner.release(&current, Some(&booking)).await?;
            SlotChange::Released {
                released: released.released,
            }
        } else if slot_changing {
            let moved = self.reassigner.reassign(&current, &booking).await?;
            SlotChange::Moved {
                released: moved.released,
                claimed: moved.claimed.unwrap_or(target_key),
            }
        } else {
            debug!("Booking {} keeps slot {}", booking.id, target_key);
            self.reassigner.rewrite(&current, &booking).await?;
            SlotChange::Unchanged
        };

        Ok((booking, slot, assigning))
    }

    pub async fn cancel_booking(&self, booking_id: &str, reason: Option<String>) -> Result<Booking, AppointmentError> {
        self.with_fresh_booking(booking_id, |current| self.apply_cancel(current, reason.as_deref()))
            .await
    }

    async fn apply_cancel(&self, current: Booking, reason: Option<&str>) -> Result<Booking, AppointmentError> {
        if !self
            .lifecycle
            .validate_status_transition(current.status, BookingStatus::Cancelled, &current.payment)?
        {
            debug!("Booking {} already cancelled", current.id);
            return Ok(current);
        }

        let mut booking = current.clone();
        booking.status = BookingStatus::Cancelled;
        booking.cancellation_reason = reason.map(str::to_string);
        touch(&mut booking, &current);

        self.reassigner.release(&current, Some(&booking)).await?;
        info!("Booking {} cancelled", booking.id);
        Ok(booking)
    }

    pub async fn complete_booking(&self, booking_id: &str) -> Result<Booking, AppointmentError> {
        self.transition(booking_id, BookingStatus::Completed).await
    }

    pub async fn request_refund(&self, booking_id: &str) -> Result<Booking, AppointmentError> {
        self.transition(booking_id, BookingStatus::RefundRequested).await
    }

    /// Remove the booking and the slot records it owns in one transaction.
    pub async fn delete_booking(&self, booking_id: &str) -> Result<(), AppointmentError> {
        let released = self
            .with_fresh_booking(booking_id, |current| self.apply_delete(current))
            .await?;

        info!("Booking {} deleted (released {:?})", booking_id, released.released);
        Ok(())
    }

    async fn apply_delete(&self, current: Booking) -> Result<SlotMove, AppointmentError> {
        self.reassigner.release(&current, None).await
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    /// Run `op` against the stored booking, reading it again whenever the
    /// write finds that someone else got there first.
    async fn with_fresh_booking<T, F, Fut>(&self, booking_id: &str, mut op: F) -> Result<T, AppointmentError>
    where
        F: FnMut(Booking) -> Fut,
        Fut: Future<Output = Result<T, AppointmentError>>,
    {
        for n in 1..=self.max_attempts {
            let current = self.get_booking(booking_id).await?;
            match op(current).await {
                Err(AppointmentError::StaleBooking { .. }) => {
                    warn!(
                        "Booking {} changed while being edited (attempt {}/{})",
                        booking_id, n, self.max_attempts
                    );
                }
                other => return other,
            }
        }

        Err(AppointmentError::StaleBooking {
            booking_id: booking_id.to_string(),
        })
    }

    async fn transition(&self, booking_id: &str, to: BookingStatus) -> Result<Booking, AppointmentError> {
        self.with_fresh_booking(booking_id, |current| self.apply_transition(current, to))
            .await
    }

    async fn apply_transition(&self, current: Booking, to: BookingStatus) -> Result<Booking, AppointmentError> {
        if !self.lifecycle.validate_status_transition(current.status, to, &current.payment)? {
            return Ok(current);
        }

        let mut booking = current.clone();
        booking.status = to;
        touch(&mut booking, &current);

        self.reassigner.rewrite(&current, &booking).await?;
        info!("Booking {} is now {}", booking.id, to);
        Ok(booking)
    }

    async fn lookup_doctor(&self, doctor_id: &str, hospital_id: Option<&str>) -> Result<DoctorSnapshot, AppointmentError> {
        let doctor = self
            .directory
            .lookup(doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        // A doctor from another hospital does not exist for this booking
        if let (Some(expected), Some(actual)) = (hospital_id, doctor.hospital_id.as_deref()) {
            if expected != actual {
                warn!("Doctor {} belongs to hospital {}, not {}", doctor_id, actual, expected);
                return Err(AppointmentError::DoctorNotFound);
            }
        }

        Ok(doctor)
    }
}

fn matches_query(booking: &Booking, query: &BookingListQuery, date: Option<NaiveDate>) -> bool {
    fn field_matches(value: Option<&String>, wanted: Option<&String>) -> bool {
        wanted.map_or(true, |w| value == Some(w))
    }

    field_matches(booking.hospital_id.as_ref(), query.hospital_id.as_ref())
        && field_matches(booking.patient_id.as_ref(), query.patient_id.as_ref())
        && field_matches(booking.doctor_id.as_ref(), query.doctor_id.as_ref())
        && date.map_or(true, |d| booking.appointment_date == d)
        && query.status.map_or(true, |s| booking.status == s)
}

fn validate_doctor_id(raw: Option<&str>) -> Result<Option<String>, AppointmentError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(id) if id.eq_ignore_ascii_case(PENDING_OWNER) => Err(AppointmentError::Validation(format!(
            "{} is reserved and cannot be used as a doctor id",
            PENDING_OWNER
        ))),
        Some(id) => Ok(Some(id.to_string())),
    }
}

fn required_text(raw: &str, field: &str) -> Result<String, AppointmentError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppointmentError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn non_negative(value: Option<f64>, field: &str) -> Result<Option<f64>, AppointmentError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(AppointmentError::Validation(format!(
            "{} must be a non-negative amount",
            field
        ))),
        other => Ok(other),
    }
}

/// Next revision of `booking`, planned from `current`.
fn touch(booking: &mut Booking, current: &Booking) {
    booking.revision = current.revision + 1;
    booking.updated_at = Utc::now();
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
