use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_database::DocumentStore;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{CreateDoctorRequest, DoctorError};
use crate::services::directory::DoctorService;

#[derive(Clone)]
pub struct DoctorState {
    pub store: Arc<dyn DocumentStore>,
}

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<DoctorState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let service = DoctorService::new(Arc::clone(&state.store));
    let doctor = service.create_doctor(request).await.map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(Arc::clone(&state.store));
    let doctor = service.get_doctor(&doctor_id).await.map_err(map_doctor_error)?;

    // Other hospitals' doctors are invisible to non-admins
    if user.role() != Role::Admin {
        if let (Some(caller), Some(owner)) = (user.hospital_id(), doctor.hospital_id.as_deref()) {
            if caller != owner {
                return Err(AppError::NotFound("Doctor not found".to_string()));
            }
        }
    }

    Ok(Json(json!(doctor)))
}
