use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DOCTORS_COLLECTION: &str = "doctors";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub hospital_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization: String,
    pub consultation_fee: f64,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn snapshot(&self) -> DoctorSnapshot {
        DoctorSnapshot {
            doctor_id: self.id.clone(),
            hospital_id: self.hospital_id.clone(),
            display_name: format!("Dr. {}", self.full_name()),
            specialization: self.specialization.clone(),
            consultation_fee: self.consultation_fee,
        }
    }
}

/// What a booking copies from the directory at assignment time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSnapshot {
    pub doctor_id: String,
    pub hospital_id: Option<String>,
    pub display_name: String,
    pub specialization: String,
    pub consultation_fee: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub id: Option<String>,
    pub hospital_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialization: String,
    pub consultation_fee: f64,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<shared_database::StoreError> for DoctorError {
    fn from(err: shared_database::StoreError) -> Self {
        DoctorError::DatabaseError(err.to_string())
    }
}
