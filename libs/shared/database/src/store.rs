// libs/shared/database/src/store.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared_models::{Appointment, AvailabilityRule, DayOfWeek, DoctorProfile, TimeSlot};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    /// Another non-terminal appointment already occupies the
    /// (doctor, date, time) key. Raised at commit time so a race between
    /// two conflict checks cannot produce a silent double-booking.
    #[error("uniqueness constraint violated for (doctor, date, time)")]
    UniqueViolation,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Transactional persistence consumed by the scheduling core.
///
/// `insert_appointment` and `move_appointment` are single atomic units:
/// the appointment write and the slot reservation either both commit or
/// neither does, and both enforce at-most-one non-terminal occupant per
/// (doctor, date, time).
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    // ----- appointments -------------------------------------------------

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Atomically insert a new appointment and mark its time slot
    /// unavailable. Fails with `UniqueViolation` if the slot key is taken.
    async fn insert_appointment(
        &self,
        appointment: &Appointment,
    ) -> Result<Appointment, StoreError>;

    /// Persist field changes on an existing appointment. If the new status
    /// re-occupies a slot (rebooking), the uniqueness constraint applies.
    async fn update_appointment(
        &self,
        appointment: &Appointment,
    ) -> Result<Appointment, StoreError>;

    /// Atomically release the old slot, reserve the new one, and persist
    /// the rescheduled appointment.
    async fn move_appointment(
        &self,
        appointment: &Appointment,
        old_date: NaiveDate,
        old_time: NaiveTime,
    ) -> Result<Appointment, StoreError>;

    async fn doctor_appointments_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn patient_appointments_on(
        &self,
        patient_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn doctor_appointments_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Approved appointments whose scheduled start is at or before `cutoff`.
    async fn approved_started_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    // ----- availability rules (read-only to this core) -------------------

    async fn availability_rules_for(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
    ) -> Result<Vec<AvailabilityRule>, StoreError>;

    // ----- time slots -----------------------------------------------------

    async fn time_slot_at(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<TimeSlot>, StoreError>;

    async fn time_slots_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeSlot>, StoreError>;

    /// Insert a slot row unless one already exists for the same
    /// (doctor, date, time). Returns whether a row was created, so bulk
    /// generation stays idempotent and never clobbers manual blocks.
    async fn insert_time_slot(&self, slot: &TimeSlot) -> Result<bool, StoreError>;

    async fn update_time_slot(&self, slot: &TimeSlot) -> Result<TimeSlot, StoreError>;

    /// Mark the slot bookable again (no-op for blocked or missing rows).
    async fn release_time_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<(), StoreError>;

    // ----- doctor directory ------------------------------------------------

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>, StoreError>;
}
