use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use shared_database::{fetch_in, to_document, DocumentStore, StoreTransaction};

use crate::models::{AppointmentError, Booking, SlotRecord, APPOINTMENTS_COLLECTION, SLOTS_COLLECTION};
use crate::services::conflict::{ConflictChecker, SlotAvailability};
use crate::services::slot_key::SlotClaim;

/// Slot records touched by one committed transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotMove {
    pub released: Vec<String>,
    pub claimed: Option<String>,
}

/// Writes a booking document together with the slot records it owns, inside
/// one store transaction.
///
/// Every attempt first reads the stored booking and refuses to go on when its
/// revision is not the one the caller planned from
/// ([`AppointmentError::StaleBooking`]). It then reads the held records and the
/// target record before writing anything. A target held by another booking
/// fails the attempt with [`AppointmentError::SlotConflict`] and nothing is
/// written. If the store aborts the commit because something read changed
/// underneath, the attempt is replayed up to `max_attempts` times.
pub struct SlotReassigner {
    store: Arc<dyn DocumentStore>,
    max_attempts: u32,
}

/// One booking write and its slot side effects.
struct Plan<'a> {
    booking_id: &'a str,
    /// Revision the stored booking must still carry; `None` for a new booking.
    expected_revision: Option<u64>,
    release: Vec<String>,
    target: Option<(&'a SlotClaim, String)>,
    /// Booking document to store; `None` deletes it.
    document: Option<Value>,
}

impl Plan<'_> {
    fn contended_key(&self) -> String {
        self.target
            .as_ref()
            .map(|(_, key)| key.clone())
            .or_else(|| self.release.first().cloned())
            .unwrap_or_else(|| self.booking_id.to_string())
    }
}

impl SlotReassigner {
    pub fn new(store: Arc<dyn DocumentStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Store a new booking and claim its slot.
    pub async fn claim(&self, booking: &Booking) -> Result<SlotMove, AppointmentError> {
        let target = booking.slot_claim();
        let target_key = target.key();
        let plan = Plan {
            booking_id: &booking.id,
            expected_revision: None,
            release: Vec::new(),
            target: Some((&target, target_key.clone())),
            document: Some(to_document(booking)?),
        };

        let slot_move = self.with_retries(&plan).await?;
        info!("Booking {} created on {}", booking.id, target_key);
        Ok(slot_move)
    }

    /// Replace `current` with `updated`, moving the slot from the keys
    /// `current` holds to the one `updated` maps to.
    pub async fn reassign(&self, current: &Booking, updated: &Booking) -> Result<SlotMove, AppointmentError> {
        let target = updated.slot_claim();
        let target_key = target.key();
        let plan = Plan {
            booking_id: &current.id,
            expected_revision: Some(current.revision),
            release: distinct_keys(&current.held_claims(), Some(&target_key)),
            target: Some((&target, target_key.clone())),
            document: Some(to_document(updated)?),
        };

        debug!(
            "Reassigning booking {} from {:?} to {}",
            current.id, plan.release, target_key
        );

        let slot_move = self.with_retries(&plan).await?;
        info!(
            "Booking {} now holds {} (released {:?})",
            current.id, target_key, slot_move.released
        );
        Ok(slot_move)
    }

    /// Replace `current` with `updated` without touching slot records.
    pub async fn rewrite(&self, current: &Booking, updated: &Booking) -> Result<(), AppointmentError> {
        let plan = Plan {
            booking_id: &current.id,
            expected_revision: Some(current.revision),
            release: Vec::new(),
            target: None,
            document: Some(to_document(updated)?),
        };

        self.with_retries(&plan).await?;
        Ok(())
    }

    /// Drop every slot record `current` owns. The booking document is
    /// replaced by `updated`, or deleted when there is none.
    pub async fn release(&self, current: &Booking, updated: Option<&Booking>) -> Result<SlotMove, AppointmentError> {
        let plan = Plan {
            booking_id: &current.id,
            expected_revision: Some(current.revision),
            release: distinct_keys(&current.held_claims(), None),
            target: None,
            document: updated.map(to_document).transpose()?,
        };

        let slot_move = self.with_retries(&plan).await?;
        info!("Booking {} released {:?}", current.id, slot_move.released);
        Ok(slot_move)
    }

    async fn with_retries(&self, plan: &Plan<'_>) -> Result<SlotMove, AppointmentError> {
        let contended_key = plan.contended_key();

        for n in 1..=self.max_attempts {
            match self.attempt(plan).await {
                Err(AppointmentError::Store(e)) if e.is_aborted() => {
                    warn!(
                        "Slot transaction on {} aborted (attempt {}/{}): {}",
                        contended_key, n, self.max_attempts, e
                    );
                }
                other => return other,
            }
        }

        warn!(
            "Giving up on {} after {} aborted attempts",
            contended_key, self.max_attempts
        );
        Err(AppointmentError::SlotConflict {
            slot_key: contended_key,
        })
    }

    async fn attempt(&self, plan: &Plan<'_>) -> Result<SlotMove, AppointmentError> {
        let mut tx = self.store.begin().await?;

        match stage(tx.as_mut(), plan).await {
            Ok(slot_move) => {
                tx.commit().await?;
                Ok(slot_move)
            }
            Err(e) => {
                abandon(tx, plan.booking_id).await;
                Err(e)
            }
        }
    }
}

async fn stage(tx: &mut dyn StoreTransaction, plan: &Plan<'_>) -> Result<SlotMove, AppointmentError> {
    let booking_id = plan.booking_id;

    // reads
    let stored: Option<Booking> = fetch_in(tx, APPOINTMENTS_COLLECTION, booking_id).await?;
    match (plan.expected_revision, stored) {
        (None, None) => {}
        (Some(_), None) => return Err(AppointmentError::NotFound),
        (Some(expected), Some(stored)) if stored.revision == expected => {}
        (_, Some(stored)) => {
            debug!(
                "Booking {} is at revision {}, expected {:?}",
                booking_id, stored.revision, plan.expected_revision
            );
            return Err(AppointmentError::StaleBooking {
                booking_id: booking_id.to_string(),
            });
        }
    }

    let owned = owned_keys(tx, booking_id, &plan.release).await?;

    let existing = match &plan.target {
        Some((_, target_key)) => {
            let (availability, existing) = ConflictChecker::check_in(tx, target_key, booking_id).await?;
            if let SlotAvailability::Conflict { .. } = availability {
                return Err(AppointmentError::SlotConflict {
                    slot_key: target_key.clone(),
                });
            }
            existing
        }
        None => None,
    };

    // writes
    for key in &owned {
        tx.delete(SLOTS_COLLECTION, key)?;
    }

    let claimed = match &plan.target {
        Some((target, target_key)) => {
            let now = Utc::now();
            let record = SlotRecord {
                appointment_id: booking_id.to_string(),
                owner: target.owner.to_string(),
                date: target.date,
                time: target.time.clone(),
                created_at: existing.map(|r| r.created_at).unwrap_or(now),
                updated_at: now,
            };
            tx.set(SLOTS_COLLECTION, target_key, to_document(&record)?)?;
            Some(target_key.clone())
        }
        None => None,
    };

    match &plan.document {
        Some(document) => tx.set(APPOINTMENTS_COLLECTION, booking_id, document.clone())?,
        None => tx.delete(APPOINTMENTS_COLLECTION, booking_id)?,
    }

    Ok(SlotMove {
        released: owned,
        claimed,
    })
}

/// Keys among `keys` whose record is held by `booking_id`. Records held by
/// other bookings are left alone.
async fn owned_keys(
    tx: &mut dyn StoreTransaction,
    booking_id: &str,
    keys: &[String],
) -> Result<Vec<String>, AppointmentError> {
    let mut owned = Vec::with_capacity(keys.len());
    for key in keys {
        let record: Option<SlotRecord> = fetch_in(tx, SLOTS_COLLECTION, key).await?;
        match record {
            Some(record) if record.appointment_id == booking_id => owned.push(key.clone()),
            Some(record) => debug!(
                "Not releasing {}: held by {} rather than {}",
                key, record.appointment_id, booking_id
            ),
            None => debug!("Not releasing {}: no record", key),
        }
    }
    Ok(owned)
}

async fn abandon(tx: Box<dyn StoreTransaction>, booking_id: &str) {
    if let Err(e) = tx.rollback().await {
        warn!("Rollback for booking {} failed: {}", booking_id, e);
    }
}

fn distinct_keys(claims: &[SlotClaim], except: Option<&str>) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(claims.len());
    for key in claims.iter().map(SlotClaim::key) {
        if Some(key.as_str()) != except && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::slot_key::SlotOwner;
    use chrono::NaiveDate;

    fn claim(owner: SlotOwner, time: &str) -> SlotClaim {
        SlotClaim::new(owner, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), time).unwrap()
    }

    #[test]
    fn distinct_keys_drop_duplicates_and_the_target() {
        let held = vec![
            claim(SlotOwner::Pending, "09:00"),
            claim(SlotOwner::Pending, "9:00"),
            claim(SlotOwner::Doctor("d1".to_string()), "09:00"),
        ];

        assert_eq!(
            distinct_keys(&held, Some("d1_2024-01-15_09-00")),
            vec!["PENDING_2024-01-15_09-00".to_string()]
        );
        assert_eq!(distinct_keys(&held, None).len(), 2);
    }
}
