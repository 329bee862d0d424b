#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

use appointment_cell::models::{
    Booking, BookingSource, BookingStatus, PaymentDetails, SlotRecord, APPOINTMENTS_COLLECTION, SLOTS_COLLECTION,
};
use appointment_cell::services::{BookingService, SlotClaim, SlotOwner};
use doctor_cell::{CreateDoctorRequest, DoctorService};
use notification_cell::{DeliveryReceipt, DependencyError, MessagingClient};
use shared_database::{to_document, DocumentStore, MemoryDocumentStore, StoreError, StoreTransaction};

/// Records every message and optionally fails like the provider would.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingClient for RecordingMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, DependencyError> {
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        if self.fail {
            return Err(DependencyError::Provider {
                code: Some(131026),
                message: "Message undeliverable".to_string(),
            });
        }
        Ok(DeliveryReceipt {
            destination: to.to_string(),
            provider_message_id: Some("wamid.test".to_string()),
        })
    }
}

#[derive(Default)]
struct Counters {
    forced_aborts: AtomicU32,
    commits: AtomicU32,
    aborts: AtomicU32,
}

/// Memory store that hands control back to the runtime before every read and
/// commit, so transactions driven by `futures::join!` really interleave. It
/// can also fail a number of commits the way a contended store would.
#[derive(Clone)]
pub struct ContendedStore {
    inner: MemoryDocumentStore,
    counters: Arc<Counters>,
}

impl ContendedStore {
    pub fn new(inner: MemoryDocumentStore) -> Self {
        Self {
            inner,
            counters: Arc::new(Counters::default()),
        }
    }

    /// The next `n` commits fail with [`StoreError::TransactionAborted`].
    pub fn aborting_first(inner: MemoryDocumentStore, n: u32) -> Self {
        let store = Self::new(inner);
        store.counters.forced_aborts.store(n, Ordering::SeqCst);
        store
    }

    pub fn commits(&self) -> u32 {
        self.counters.commits.load(Ordering::SeqCst)
    }

    pub fn aborts(&self) -> u32 {
        self.counters.aborts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for ContendedStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, document: Value) -> Result<(), StoreError> {
        self.inner.set(collection, id, document).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Value>, StoreError> {
        self.inner.list(collection).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        tokio::task::yield_now().await;
        Ok(Box::new(ContendedTransaction {
            inner: self.inner.begin().await?,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ContendedTransaction {
    inner: Box<dyn StoreTransaction>,
    counters: Arc<Counters>,
}

#[async_trait]
impl StoreTransaction for ContendedTransaction {
    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get(collection, id).await
    }

    fn set(&mut self, collection: &str, id: &str, document: Value) -> Result<(), StoreError> {
        self.inner.set(collection, id, document)
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let counters = self.counters;
        counters.commits.fetch_add(1, Ordering::SeqCst);

        let forced = counters
            .forced_aborts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result = if forced {
            self.inner.rollback().await?;
            Err(StoreError::TransactionAborted("forced".to_string()))
        } else {
            self.inner.commit().await
        };

        if matches!(&result, Err(e) if e.is_aborted()) {
            counters.aborts.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

pub struct TestContext {
    pub store: MemoryDocumentStore,
    pub messenger: Arc<RecordingMessenger>,
    pub service: Arc<BookingService>,
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

pub async fn setup() -> TestContext {
    setup_with(RecordingMessenger::default()).await
}

pub async fn setup_with(messenger: RecordingMessenger) -> TestContext {
    let store = MemoryDocumentStore::new();
    let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
    build(store, shared, messenger).await
}

/// Service running on `contended`, whose inner memory store is `store`.
pub async fn setup_contended(store: MemoryDocumentStore, contended: ContendedStore) -> TestContext {
    build(store, Arc::new(contended), RecordingMessenger::default()).await
}

async fn build(store: MemoryDocumentStore, shared: Arc<dyn DocumentStore>, messenger: RecordingMessenger) -> TestContext {
    let doctors = DoctorService::new(Arc::clone(&shared));

    for (id, hospital, first, specialization, fee) in [
        ("d1", "h1", "Meera", "Cardiology", 500.0),
        ("d2", "h1", "Vikram", "Dermatology", 800.0),
        ("d9", "h2", "Farah", "Pediatrics", 300.0),
    ] {
        doctors
            .create_doctor(CreateDoctorRequest {
                id: Some(id.to_string()),
                hospital_id: Some(hospital.to_string()),
                first_name: first.to_string(),
                last_name: "Iyer".to_string(),
                email: None,
                phone: None,
                specialization: specialization.to_string(),
                consultation_fee: fee,
                is_available: true,
            })
            .await
            .unwrap();
    }

    let messenger = Arc::new(messenger);
    let service = Arc::new(BookingService::new(
        shared,
        Arc::new(doctors),
        messenger.clone(),
        3,
    ));

    TestContext {
        store,
        messenger,
        service,
    }
}

/// Store a booking and the slot record it owns, bypassing intake.
pub async fn seed_booking(store: &MemoryDocumentStore, id: &str, doctor_id: Option<&str>, time: &str) -> Booking {
    let now = Utc::now();
    let booking = Booking {
        id: id.to_string(),
        hospital_id: Some("h1".to_string()),
        patient_id: Some("p1".to_string()),
        patient_name: "Asha Rao".to_string(),
        patient_phone: Some("9876543210".to_string()),
        patient_email: None,
        doctor_id: doctor_id.map(str::to_string),
        doctor_name: doctor_id.map(|d| format!("Dr. {}", d)),
        specialization: doctor_id.map(|_| "Cardiology".to_string()),
        appointment_date: date(),
        appointment_time: time.to_string(),
        status: if doctor_id.is_some() {
            BookingStatus::Confirmed
        } else {
            BookingStatus::WhatsappPending
        },
        source: BookingSource::Whatsapp,
        pending_assignment: doctor_id.is_none(),
        notes: None,
        payment: PaymentDetails::new(500.0, 0.0, None),
        cancellation_reason: None,
        revision: 0,
        created_at: now,
        updated_at: now,
    };

    let claim = SlotClaim::from_stored(SlotOwner::for_doctor(doctor_id), date(), time);
    let record = SlotRecord {
        appointment_id: id.to_string(),
        owner: claim.owner.to_string(),
        date: claim.date,
        time: claim.time.clone(),
        created_at: now,
        updated_at: now,
    };

    store
        .set(APPOINTMENTS_COLLECTION, id, to_document(&booking).unwrap())
        .await
        .unwrap();
    store
        .set(SLOTS_COLLECTION, &claim.key(), to_document(&record).unwrap())
        .await
        .unwrap();

    booking
}

pub async fn slot_holder(store: &MemoryDocumentStore, key: &str) -> Option<String> {
    store
        .get(SLOTS_COLLECTION, key)
        .await
        .unwrap()
        .map(|doc| doc["appointment_id"].as_str().unwrap().to_string())
}
