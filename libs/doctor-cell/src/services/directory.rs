use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{fetch, to_document, DocumentStore};

use crate::models::{CreateDoctorRequest, Doctor, DoctorError, DoctorSnapshot, DOCTORS_COLLECTION};

/// Point-in-time doctor lookup used when a booking is assigned.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn lookup(&self, doctor_id: &str) -> Result<Option<DoctorSnapshot>, DoctorError>;
}

pub struct DoctorService {
    store: Arc<dyn DocumentStore>,
}

impl DoctorService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create_doctor(&self, request: CreateDoctorRequest) -> Result<Doctor, DoctorError> {
        if request.first_name.trim().is_empty() || request.specialization.trim().is_empty() {
            return Err(DoctorError::ValidationError(
                "Doctor name and specialization are required".to_string(),
            ));
        }
        if !request.consultation_fee.is_finite() || request.consultation_fee < 0.0 {
            return Err(DoctorError::ValidationError(
                "Consultation fee must be a non-negative amount".to_string(),
            ));
        }

        let now = Utc::now();
        let doctor = Doctor {
            id: request
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            hospital_id: request.hospital_id,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email,
            phone: request.phone,
            specialization: request.specialization.trim().to_string(),
            consultation_fee: request.consultation_fee,
            is_available: request.is_available,
            created_at: now,
            updated_at: now,
        };

        self.store
            .set(DOCTORS_COLLECTION, &doctor.id, to_document(&doctor)?)
            .await?;

        info!("Doctor {} registered ({})", doctor.id, doctor.specialization);
        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: &str) -> Result<Doctor, DoctorError> {
        fetch::<Doctor>(self.store.as_ref(), DOCTORS_COLLECTION, doctor_id)
            .await?
            .ok_or(DoctorError::NotFound)
    }
}

#[async_trait]
impl DoctorDirectory for DoctorService {
    async fn lookup(&self, doctor_id: &str) -> Result<Option<DoctorSnapshot>, DoctorError> {
        debug!("Looking up doctor {}", doctor_id);
        let doctor = fetch::<Doctor>(self.store.as_ref(), DOCTORS_COLLECTION, doctor_id).await?;
        Ok(doctor.map(|d| d.snapshot()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_database::MemoryDocumentStore;

    fn request(fee: f64) -> CreateDoctorRequest {
        CreateDoctorRequest {
            id: Some("d1".to_string()),
            hospital_id: Some("h1".to_string()),
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            email: None,
            phone: None,
            specialization: "Cardiology".to_string(),
            consultation_fee: fee,
            is_available: true,
        }
    }

    #[tokio::test]
    async fn lookup_returns_point_in_time_snapshot() {
        let service = DoctorService::new(Arc::new(MemoryDocumentStore::new()));
        service.create_doctor(request(500.0)).await.unwrap();

        let snapshot = service.lookup("d1").await.unwrap().unwrap();
        assert_eq!(snapshot.display_name, "Dr. Asha Rao");
        assert_eq!(snapshot.specialization, "Cardiology");
        assert_eq!(snapshot.consultation_fee, 500.0);
        assert_eq!(snapshot.hospital_id.as_deref(), Some("h1"));

        assert!(service.lookup("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn negative_fee_is_rejected() {
        let service = DoctorService::new(Arc::new(MemoryDocumentStore::new()));
        assert_matches!(
            service.create_doctor(request(-1.0)).await,
            Err(DoctorError::ValidationError(_))
        );
    }
}
