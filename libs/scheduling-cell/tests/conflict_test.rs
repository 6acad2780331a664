use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use scheduling_cell::services::conflict::{intervals_overlap, ConflictDetectionService};
use scheduling_cell::services::slots::TimeSlotLedger;
use shared_database::{Clock, FixedClock, MemoryStore, SchedulingStore};
use shared_models::{
    Appointment, AppointmentStatus, AvailabilityRule, ConflictKind, DayOfWeek,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    date(2025, 3, 1).and_time(time(12, 0)).and_utc()
}

// 2025-03-10 is a Monday.
const MONDAY: (i32, u32, u32) = (2025, 3, 10);

fn monday() -> NaiveDate {
    date(MONDAY.0, MONDAY.1, MONDAY.2)
}

fn office_hours(doctor_id: Uuid) -> AvailabilityRule {
    AvailabilityRule {
        id: Uuid::new_v4(),
        doctor_id,
        day_of_week: DayOfWeek::Monday,
        start_time: time(9, 0),
        end_time: time(17, 0),
        is_available: true,
    }
}

fn booked(doctor_id: Uuid, patient_id: Uuid, t: NaiveTime, duration: i32) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        doctor_id,
        patient_id,
        appointment_date: monday(),
        appointment_time: t,
        duration_minutes: duration,
        status: AppointmentStatus::Approved,
        reason: "recurring check-up".to_string(),
        doctor_notes: None,
        patient_notes: None,
        rating: None,
        review: None,
        follow_up_required: false,
        follow_up_date: None,
        fee: 60.0,
        created_at: now(),
        updated_at: now(),
    }
}

async fn detector(store: Arc<MemoryStore>) -> ConflictDetectionService {
    let dyn_store = store as Arc<dyn SchedulingStore>;
    let clock = Arc::new(FixedClock::new(now())) as Arc<dyn Clock>;
    let ledger = TimeSlotLedger::new(Arc::clone(&dyn_store), clock, 30);
    ConflictDetectionService::new(dyn_store, ledger)
}

#[test]
fn overlap_is_symmetric_for_unequal_durations() {
    let a = time(10, 0);
    let b = time(10, 15);
    assert!(intervals_overlap(a, 30, b, 45));
    assert!(intervals_overlap(b, 45, a, 30));

    // Back-to-back half-open intervals do not overlap.
    let c = time(10, 30);
    assert!(!intervals_overlap(a, 30, c, 30));
    assert!(!intervals_overlap(c, 30, a, 30));
}

#[tokio::test]
async fn outside_availability_when_no_window_covers_request() {
    let doctor = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.seed_rule(office_hours(doctor)).await;
    let detector = detector(store).await;

    // 16:45 + 30 minutes runs past the 17:00 close.
    let result = detector
        .detect_conflicts(doctor, Uuid::new_v4(), monday(), time(16, 45), 30, None)
        .await
        .unwrap();
    assert!(result.has_conflict);
    assert_eq!(
        result.conflict_type,
        Some(ConflictKind::OutsideAvailability)
    );

    // A day with no recurring rule at all.
    let tuesday = date(2025, 3, 11);
    let result = detector
        .detect_conflicts(doctor, Uuid::new_v4(), tuesday, time(10, 0), 30, None)
        .await
        .unwrap();
    assert!(result.has_conflict);
    assert_eq!(
        result.conflict_type,
        Some(ConflictKind::OutsideAvailability)
    );
}

#[tokio::test]
async fn doctor_busy_when_intervals_overlap() {
    let doctor = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.seed_rule(office_hours(doctor)).await;
    store
        .seed_appointment(booked(doctor, Uuid::new_v4(), time(10, 0), 30))
        .await;
    let detector = detector(store).await;

    let result = detector
        .detect_conflicts(doctor, Uuid::new_v4(), monday(), time(10, 15), 30, None)
        .await
        .unwrap();
    assert!(result.has_conflict);
    assert_eq!(result.conflict_type, Some(ConflictKind::DoctorBusy));
    assert!(result.conflict_details.is_some());
}

#[tokio::test]
async fn detection_is_symmetric_between_overlapping_intervals() {
    let doctor = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.seed_rule(office_hours(doctor)).await;

    // Existing booking 10:15-11:00; a 10:00-10:30 request must collide,
    // and with the bookings swapped the collision holds the other way.
    store
        .seed_appointment(booked(doctor, Uuid::new_v4(), time(10, 15), 45))
        .await;
    let detector_a = detector(Arc::clone(&store)).await;
    let result = detector_a
        .detect_conflicts(doctor, Uuid::new_v4(), monday(), time(10, 0), 30, None)
        .await
        .unwrap();
    assert_eq!(result.conflict_type, Some(ConflictKind::DoctorBusy));

    let other_doctor = Uuid::new_v4();
    store.seed_rule(office_hours(other_doctor)).await;
    store
        .seed_appointment(booked(other_doctor, Uuid::new_v4(), time(10, 0), 30))
        .await;
    let detector_b = detector(store).await;
    let result = detector_b
        .detect_conflicts(other_doctor, Uuid::new_v4(), monday(), time(10, 15), 45, None)
        .await
        .unwrap();
    assert_eq!(result.conflict_type, Some(ConflictKind::DoctorBusy));
}

#[tokio::test]
async fn terminal_appointments_do_not_block_the_slot() {
    let doctor = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.seed_rule(office_hours(doctor)).await;
    let mut done = booked(doctor, Uuid::new_v4(), time(10, 0), 30);
    done.status = AppointmentStatus::Completed;
    store.seed_appointment(done).await;
    let detector = detector(store).await;

    let result = detector
        .detect_conflicts(doctor, Uuid::new_v4(), monday(), time(10, 0), 30, None)
        .await
        .unwrap();
    assert!(!result.has_conflict);
}

#[tokio::test]
async fn patient_busy_across_doctors() {
    let doctor_a = Uuid::new_v4();
    let doctor_b = Uuid::new_v4();
    let patient = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.seed_rule(office_hours(doctor_a)).await;
    store.seed_rule(office_hours(doctor_b)).await;
    store
        .seed_appointment(booked(doctor_a, patient, time(10, 0), 30))
        .await;
    let detector = detector(store).await;

    let result = detector
        .detect_conflicts(doctor_b, patient, monday(), time(10, 15), 30, None)
        .await
        .unwrap();
    assert!(result.has_conflict);
    assert_eq!(result.conflict_type, Some(ConflictKind::PatientBusy));
}

#[tokio::test]
async fn blocked_slot_surfaces_its_reason() {
    let doctor = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.seed_rule(office_hours(doctor)).await;
    let dyn_store = Arc::clone(&store) as Arc<dyn SchedulingStore>;
    let clock = Arc::new(FixedClock::new(now())) as Arc<dyn Clock>;
    let ledger = TimeSlotLedger::new(Arc::clone(&dyn_store), clock, 30);
    ledger
        .block_slot(doctor, monday(), time(11, 0), Some("staff meeting".to_string()))
        .await
        .unwrap();
    let detector = ConflictDetectionService::new(dyn_store, ledger);

    let result = detector
        .detect_conflicts(doctor, Uuid::new_v4(), monday(), time(11, 0), 30, None)
        .await
        .unwrap();
    assert!(result.has_conflict);
    assert_eq!(
        result.conflict_type,
        Some(ConflictKind::TimeSlotUnavailable)
    );
    assert_eq!(result.conflict_details.as_deref(), Some("staff meeting"));
}

#[tokio::test]
async fn excluded_appointment_does_not_conflict_with_itself() {
    let doctor = Uuid::new_v4();
    let patient = Uuid::new_v4();
    let store = Arc::new(MemoryStore::new());
    store.seed_rule(office_hours(doctor)).await;
    let existing = booked(doctor, patient, time(10, 0), 30);
    let existing_id = existing.id;
    store.seed_appointment(existing).await;
    let detector = detector(store).await;

    // A reschedule nudging the booking by 15 minutes overlaps only itself.
    let result = detector
        .detect_conflicts(doctor, patient, monday(), time(10, 15), 30, Some(existing_id))
        .await
        .unwrap();
    assert!(!result.has_conflict);

    // Without the exclusion the same request collides.
    let result = detector
        .detect_conflicts(doctor, patient, monday(), time(10, 15), 30, None)
        .await
        .unwrap();
    assert_eq!(result.conflict_type, Some(ConflictKind::DoctorBusy));
}
