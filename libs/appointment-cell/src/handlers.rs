// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{
    AppointmentError, Booking, BookingListQuery, CreateBookingRequest, SlotCheckQuery, StatusChangeRequest,
    UpdateBookingRequest,
};
use crate::services::booking::BookingService;

#[derive(Clone)]
pub struct AppointmentState {
    pub service: Arc<BookingService>,
}

pub fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::Validation(msg) => AppError::ValidationError(msg),
        AppointmentError::NotFound | AppointmentError::HospitalScope => {
            AppError::NotFound("Appointment not found".to_string())
        }
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::SlotConflict { .. } => AppError::Conflict("Time slot already booked".to_string()),
        AppointmentError::StaleBooking { .. } => {
            AppError::Conflict("Appointment was changed by another request, please retry".to_string())
        }
        AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
        e @ (AppointmentError::InvalidStatusTransition { .. } | AppointmentError::NotReschedulable(_)) => {
            AppError::BadRequest(e.to_string())
        }
        AppointmentError::Dependency(msg) => AppError::ExternalService(msg),
        AppointmentError::Store(e) => AppError::Database(e.to_string()),
    }
}

// ==============================================================================
// ACCESS RULES
// ==============================================================================

/// Bookings of another hospital, and other patients' bookings for a patient
/// caller, are reported as missing.
fn ensure_visible(user: &User, booking: &Booking) -> Result<(), AppointmentError> {
    let role = user.role();
    if role == Role::Admin {
        return Ok(());
    }

    if let (Some(caller), Some(owner)) = (user.hospital_id(), booking.hospital_id.as_deref()) {
        if caller != owner {
            return Err(AppointmentError::HospitalScope);
        }
    }

    if role == Role::Patient && booking.patient_id.as_deref() != Some(user.id.as_str()) {
        return Err(AppointmentError::HospitalScope);
    }

    Ok(())
}

/// Receptionists and admins manage any visible booking; doctors only their own.
fn ensure_can_manage(user: &User, booking: &Booking) -> Result<(), AppError> {
    let role = require_role(user, &[Role::Admin, Role::Receptionist, Role::Doctor])?;
    if role == Role::Doctor && booking.doctor_id.as_deref() != Some(user.id.as_str()) {
        return Err(map_appointment_error(AppointmentError::Unauthorized(
            "Doctors can only manage their own appointments".to_string(),
        )));
    }
    Ok(())
}

async fn load_visible(state: &AppointmentState, user: &User, booking_id: &str) -> Result<Booking, AppError> {
    let booking = state
        .service
        .get_booking(booking_id)
        .await
        .map_err(map_appointment_error)?;
    ensure_visible(user, &booking).map_err(map_appointment_error)?;
    Ok(booking)
}

// ==============================================================================
// HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(mut request): Json<CreateBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let role = user.role();

    if role == Role::Patient {
        match request.patient_id.as_deref() {
            None => request.patient_id = Some(user.id.clone()),
            Some(id) if id == user.id => {}
            Some(_) => {
                return Err(AppError::Forbidden(
                    "Patients can only book appointments for themselves".to_string(),
                ))
            }
        }
    }

    if role != Role::Admin {
        if let Some(caller_hospital) = user.hospital_id() {
            match request.hospital_id.as_deref() {
                None => request.hospital_id = Some(caller_hospital.to_string()),
                Some(h) if h == caller_hospital => {}
                Some(_) => {
                    return Err(AppError::Forbidden(
                        "Cannot book appointments for another hospital".to_string(),
                    ))
                }
            }
        }
    }

    let booking = state
        .service
        .create_booking(request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": booking,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(mut query): Query<BookingListQuery>,
) -> Result<Json<Value>, AppError> {
    let role = user.role();

    if role != Role::Admin {
        if let Some(hospital_id) = user.hospital_id() {
            query.hospital_id = Some(hospital_id.to_string());
        }
    }
    if role == Role::Patient {
        query.patient_id = Some(user.id.clone());
    }

    let appointments = state
        .service
        .list_bookings(&query)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking = load_visible(&state, &user, &appointment_id).await?;
    Ok(Json(json!(booking)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = load_visible(&state, &user, &appointment_id).await?;
    ensure_can_manage(&user, &booking)?;

    debug!("User {} updating appointment {}", user.id, appointment_id);

    let outcome = state
        .service
        .update_booking(&appointment_id, request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "slot": outcome.slot,
        "notification": outcome.notification,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
    Json(request): Json<StatusChangeRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = load_visible(&state, &user, &appointment_id).await?;
    ensure_can_manage(&user, &booking)?;

    let booking = state
        .service
        .cancel_booking(&appointment_id, request.reason)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": booking,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let booking = load_visible(&state, &user, &appointment_id).await?;
    ensure_can_manage(&user, &booking)?;

    let booking = state
        .service
        .complete_booking(&appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": booking
    })))
}

#[axum::debug_handler]
pub async fn request_refund(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    // Patients reach this point only for their own bookings
    load_visible(&state, &user, &appointment_id).await?;
    require_role(&user, &[Role::Admin, Role::Receptionist, Role::Patient])?;

    let booking = state
        .service
        .request_refund(&appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": booking,
        "message": "Refund requested"
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    state
        .service
        .delete_booking(&appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted"
    })))
}

#[axum::debug_handler]
pub async fn check_slot(
    State(state): State<AppointmentState>,
    Extension(_user): Extension<User>,
    Query(query): Query<SlotCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let result = state.service.check_slot(&query).await.map_err(map_appointment_error)?;
    Ok(Json(json!(result)))
}
