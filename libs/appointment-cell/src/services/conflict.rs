use tracing::{debug, warn};

use shared_database::{fetch, fetch_in, DocumentStore, StoreTransaction};

use crate::models::{AppointmentError, SlotRecord, SLOTS_COLLECTION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotAvailability {
    Available,
    Conflict { held_by: String },
}

impl SlotAvailability {
    pub fn is_available(&self) -> bool {
        matches!(self, SlotAvailability::Available)
    }
}

pub struct ConflictChecker;

impl ConflictChecker {
    /// A slot is free when nothing holds it or the requesting booking already does.
    pub fn evaluate(existing: Option<&SlotRecord>, booking_id: Option<&str>) -> SlotAvailability {
        match existing {
            None => SlotAvailability::Available,
            Some(record) if Some(record.appointment_id.as_str()) == booking_id => SlotAvailability::Available,
            Some(record) => SlotAvailability::Conflict {
                held_by: record.appointment_id.clone(),
            },
        }
    }

    /// Read the slot record through the transaction so the decision and the
    /// write that follows it commit or abort together.
    pub async fn check_in(
        tx: &mut dyn StoreTransaction,
        slot_key: &str,
        booking_id: &str,
    ) -> Result<(SlotAvailability, Option<SlotRecord>), AppointmentError> {
        let existing: Option<SlotRecord> = fetch_in(tx, SLOTS_COLLECTION, slot_key).await?;
        let availability = Self::evaluate(existing.as_ref(), Some(booking_id));

        if let SlotAvailability::Conflict { held_by } = &availability {
            warn!("Slot {} requested by {} is held by {}", slot_key, booking_id, held_by);
        } else {
            debug!("Slot {} is available to {}", slot_key, booking_id);
        }

        Ok((availability, existing))
    }

    /// Advisory read outside any transaction. The answer can be stale by the
    /// time a booking is written.
    pub async fn peek(
        store: &dyn DocumentStore,
        slot_key: &str,
        booking_id: Option<&str>,
    ) -> Result<SlotAvailability, AppointmentError> {
        let existing: Option<SlotRecord> = fetch(store, SLOTS_COLLECTION, slot_key).await?;
        Ok(Self::evaluate(existing.as_ref(), booking_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn record(appointment_id: &str) -> SlotRecord {
        SlotRecord {
            appointment_id: appointment_id.to_string(),
            owner: "d1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            time: "09:00".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_slot_is_available() {
        assert_eq!(ConflictChecker::evaluate(None, Some("apt1")), SlotAvailability::Available);
        assert_eq!(ConflictChecker::evaluate(None, None), SlotAvailability::Available);
    }

    #[test]
    fn own_slot_is_available() {
        let held = record("apt1");
        assert!(ConflictChecker::evaluate(Some(&held), Some("apt1")).is_available());
    }

    #[test]
    fn slot_held_by_another_booking_conflicts() {
        let held = record("apt1");
        assert_eq!(
            ConflictChecker::evaluate(Some(&held), Some("apt2")),
            SlotAvailability::Conflict {
                held_by: "apt1".to_string()
            }
        );
        assert!(!ConflictChecker::evaluate(Some(&held), None).is_available());
    }
}
