use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use shared_database::{MemoryStore, SchedulingStore, StoreError};
use shared_models::{Appointment, AppointmentStatus, TimeSlot};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn appointment(doctor_id: Uuid, t: NaiveTime, status: AppointmentStatus) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        doctor_id,
        patient_id: Uuid::new_v4(),
        appointment_date: date(2025, 3, 10),
        appointment_time: t,
        duration_minutes: 30,
        status,
        reason: "annual physical exam".to_string(),
        doctor_notes: None,
        patient_notes: None,
        rating: None,
        review: None,
        follow_up_required: false,
        follow_up_date: None,
        fee: 50.0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn insert_reserves_the_slot() {
    let store = MemoryStore::new();
    let doctor = Uuid::new_v4();
    let appt = appointment(doctor, time(10, 0), AppointmentStatus::Pending);

    store.insert_appointment(&appt).await.unwrap();

    let slot = store
        .time_slot_at(doctor, date(2025, 3, 10), time(10, 0))
        .await
        .unwrap()
        .unwrap();
    assert!(!slot.is_available);
}

#[tokio::test]
async fn duplicate_insert_violates_uniqueness() {
    let store = MemoryStore::new();
    let doctor = Uuid::new_v4();
    let first = appointment(doctor, time(10, 0), AppointmentStatus::Pending);
    let second = appointment(doctor, time(10, 0), AppointmentStatus::Pending);

    store.insert_appointment(&first).await.unwrap();
    let err = store.insert_appointment(&second).await.unwrap_err();
    assert_matches!(err, StoreError::UniqueViolation);

    // The first booking is untouched.
    let stored = store.get_appointment(first.id).await.unwrap().unwrap();
    assert_eq!(stored.id, first.id);
}

#[tokio::test]
async fn terminal_occupant_does_not_block_the_key() {
    let store = MemoryStore::new();
    let doctor = Uuid::new_v4();
    let done = appointment(doctor, time(10, 0), AppointmentStatus::Completed);
    store.seed_appointment(done).await;

    let fresh = appointment(doctor, time(10, 0), AppointmentStatus::Pending);
    store.insert_appointment(&fresh).await.unwrap();
}

#[tokio::test]
async fn move_swaps_slot_reservations() {
    let store = MemoryStore::new();
    let doctor = Uuid::new_v4();
    let mut appt = appointment(doctor, time(10, 0), AppointmentStatus::Approved);
    store.insert_appointment(&appt).await.unwrap();

    let old_time = appt.appointment_time;
    appt.appointment_time = time(14, 0);
    store
        .move_appointment(&appt, appt.appointment_date, old_time)
        .await
        .unwrap();

    let old_slot = store
        .time_slot_at(doctor, date(2025, 3, 10), time(10, 0))
        .await
        .unwrap()
        .unwrap();
    assert!(old_slot.is_available);

    let new_slot = store
        .time_slot_at(doctor, date(2025, 3, 10), time(14, 0))
        .await
        .unwrap()
        .unwrap();
    assert!(!new_slot.is_available);
}

#[tokio::test]
async fn move_into_occupied_key_fails_atomically() {
    let store = MemoryStore::new();
    let doctor = Uuid::new_v4();
    let blocker = appointment(doctor, time(14, 0), AppointmentStatus::Pending);
    store.insert_appointment(&blocker).await.unwrap();

    let mut mover = appointment(doctor, time(10, 0), AppointmentStatus::Approved);
    store.insert_appointment(&mover).await.unwrap();
    let old_time = mover.appointment_time;
    mover.appointment_time = time(14, 0);

    let err = store
        .move_appointment(&mover, mover.appointment_date, old_time)
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::UniqueViolation);

    // The old reservation is still held: nothing was released.
    let old_slot = store
        .time_slot_at(doctor, date(2025, 3, 10), time(10, 0))
        .await
        .unwrap()
        .unwrap();
    assert!(!old_slot.is_available);
}

#[tokio::test]
async fn update_rechecks_uniqueness_when_reoccupying() {
    let store = MemoryStore::new();
    let doctor = Uuid::new_v4();
    let mut cancelled = appointment(doctor, time(10, 0), AppointmentStatus::Cancelled);
    store.seed_appointment(cancelled.clone()).await;

    let rival = appointment(doctor, time(10, 0), AppointmentStatus::Pending);
    store.insert_appointment(&rival).await.unwrap();

    cancelled.status = AppointmentStatus::Pending;
    let err = store.update_appointment(&cancelled).await.unwrap_err();
    assert_matches!(err, StoreError::UniqueViolation);
}

#[tokio::test]
async fn release_leaves_blocked_slots_alone() {
    let store = MemoryStore::new();
    let doctor = Uuid::new_v4();
    let now = Utc::now();
    let slot = TimeSlot {
        id: Uuid::new_v4(),
        doctor_id: doctor,
        slot_date: date(2025, 3, 10),
        start_time: time(10, 0),
        duration_minutes: 30,
        is_available: false,
        is_blocked: true,
        block_reason: Some("maintenance".to_string()),
        created_at: now,
        updated_at: now,
    };
    store.insert_time_slot(&slot).await.unwrap();

    store
        .release_time_slot(doctor, date(2025, 3, 10), time(10, 0))
        .await
        .unwrap();

    let unchanged = store
        .time_slot_at(doctor, date(2025, 3, 10), time(10, 0))
        .await
        .unwrap()
        .unwrap();
    assert!(!unchanged.is_available);
    assert!(unchanged.is_blocked);
}

#[tokio::test]
async fn insert_time_slot_reports_existing_rows() {
    let store = MemoryStore::new();
    let doctor = Uuid::new_v4();
    let now = Utc::now();
    let slot = TimeSlot {
        id: Uuid::new_v4(),
        doctor_id: doctor,
        slot_date: date(2025, 3, 10),
        start_time: time(9, 0),
        duration_minutes: 30,
        is_available: true,
        is_blocked: false,
        block_reason: None,
        created_at: now,
        updated_at: now,
    };

    assert!(store.insert_time_slot(&slot).await.unwrap());
    assert!(!store.insert_time_slot(&slot).await.unwrap());
}

#[tokio::test]
async fn concurrent_inserts_admit_exactly_one() {
    let store = Arc::new(MemoryStore::new());
    let doctor = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let appt = appointment(doctor, time(10, 0), AppointmentStatus::Pending);
        handles.push(tokio::spawn(async move {
            store.insert_appointment(&appt).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}
