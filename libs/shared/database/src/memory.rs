// libs/shared/database/src/memory.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use shared_models::{Appointment, AvailabilityRule, DayOfWeek, DoctorProfile, TimeSlot};

use crate::store::{SchedulingStore, StoreError};

type SlotKey = (Uuid, NaiveDate, NaiveTime);

#[derive(Debug, Default)]
struct Inner {
    appointments: HashMap<Uuid, Appointment>,
    rules: Vec<AvailabilityRule>,
    slots: HashMap<SlotKey, TimeSlot>,
    doctors: HashMap<Uuid, DoctorProfile>,
}

/// In-process store. A single async mutex makes every trait call one
/// atomic unit, which is exactly the transactional contract the core
/// requires; the uniqueness constraint is re-checked inside that unit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers for tests and embedded setups.

    pub async fn seed_doctor(&self, profile: DoctorProfile) {
        self.inner.lock().await.doctors.insert(profile.id, profile);
    }

    pub async fn seed_rule(&self, rule: AvailabilityRule) {
        self.inner.lock().await.rules.push(rule);
    }

    /// Insert an appointment as-is, bypassing validation. Still reserves
    /// the slot key so conflict queries see a consistent picture.
    pub async fn seed_appointment(&self, appointment: Appointment) {
        let mut inner = self.inner.lock().await;
        if appointment.status.occupies_slot() {
            reserve_slot(&mut inner, &appointment);
        }
        inner.appointments.insert(appointment.id, appointment);
    }
}

fn slot_occupied(inner: &Inner, appointment: &Appointment) -> bool {
    inner.appointments.values().any(|other| {
        other.id != appointment.id
            && other.doctor_id == appointment.doctor_id
            && other.appointment_date == appointment.appointment_date
            && other.appointment_time == appointment.appointment_time
            && other.status.occupies_slot()
    })
}

fn reserve_slot(inner: &mut Inner, appointment: &Appointment) {
    let key = (
        appointment.doctor_id,
        appointment.appointment_date,
        appointment.appointment_time,
    );
    inner
        .slots
        .entry(key)
        .and_modify(|slot| {
            slot.is_available = false;
            slot.updated_at = appointment.updated_at;
        })
        .or_insert_with(|| TimeSlot {
            id: Uuid::new_v4(),
            doctor_id: appointment.doctor_id,
            slot_date: appointment.appointment_date,
            start_time: appointment.appointment_time,
            duration_minutes: appointment.duration_minutes,
            is_available: false,
            is_blocked: false,
            block_reason: None,
            created_at: appointment.updated_at,
            updated_at: appointment.updated_at,
        });
}

#[async_trait]
impl SchedulingStore for MemoryStore {
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.inner.lock().await.appointments.get(&id).cloned())
    }

    async fn insert_appointment(
        &self,
        appointment: &Appointment,
    ) -> Result<Appointment, StoreError> {
        let mut inner = self.inner.lock().await;
        if slot_occupied(&inner, appointment) {
            return Err(StoreError::UniqueViolation);
        }
        reserve_slot(&mut inner, appointment);
        inner
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn update_appointment(
        &self,
        appointment: &Appointment,
    ) -> Result<Appointment, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.appointments.contains_key(&appointment.id) {
            return Err(StoreError::NotFound);
        }
        // Rebooking (cancelled/rejected -> pending) re-occupies the key.
        if appointment.status.occupies_slot() {
            if slot_occupied(&inner, appointment) {
                return Err(StoreError::UniqueViolation);
            }
            reserve_slot(&mut inner, appointment);
        }
        inner
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn move_appointment(
        &self,
        appointment: &Appointment,
        old_date: NaiveDate,
        old_time: NaiveTime,
    ) -> Result<Appointment, StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.appointments.contains_key(&appointment.id) {
            return Err(StoreError::NotFound);
        }
        if slot_occupied(&inner, appointment) {
            return Err(StoreError::UniqueViolation);
        }
        let old_key = (appointment.doctor_id, old_date, old_time);
        if let Some(slot) = inner.slots.get_mut(&old_key) {
            if !slot.is_blocked {
                slot.is_available = true;
                slot.updated_at = appointment.updated_at;
            }
        }
        reserve_slot(&mut inner, appointment);
        inner
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn doctor_appointments_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.appointment_date == date)
            .cloned()
            .collect())
    }

    async fn patient_appointments_on(
        &self,
        patient_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id && a.appointment_date == date)
            .cloned()
            .collect())
    }

    async fn doctor_appointments_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .appointments
            .values()
            .filter(|a| {
                a.doctor_id == doctor_id
                    && a.appointment_date >= from
                    && a.appointment_date <= to
            })
            .cloned()
            .collect())
    }

    async fn approved_started_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .appointments
            .values()
            .filter(|a| {
                a.status == shared_models::AppointmentStatus::Approved
                    && a.scheduled_start_time() <= cutoff
            })
            .cloned()
            .collect())
    }

    async fn availability_rules_for(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
    ) -> Result<Vec<AvailabilityRule>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rules
            .iter()
            .filter(|r| r.doctor_id == doctor_id && r.day_of_week == day)
            .cloned()
            .collect())
    }

    async fn time_slot_at(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<TimeSlot>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.slots.get(&(doctor_id, date, time)).cloned())
    }

    async fn time_slots_between(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeSlot>, StoreError> {
        let inner = self.inner.lock().await;
        let mut slots: Vec<TimeSlot> = inner
            .slots
            .values()
            .filter(|s| s.doctor_id == doctor_id && s.slot_date >= from && s.slot_date <= to)
            .cloned()
            .collect();
        slots.sort_by_key(|s| (s.slot_date, s.start_time));
        Ok(slots)
    }

    async fn insert_time_slot(&self, slot: &TimeSlot) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let key = (slot.doctor_id, slot.slot_date, slot.start_time);
        if inner.slots.contains_key(&key) {
            return Ok(false);
        }
        inner.slots.insert(key, slot.clone());
        Ok(true)
    }

    async fn update_time_slot(&self, slot: &TimeSlot) -> Result<TimeSlot, StoreError> {
        let mut inner = self.inner.lock().await;
        let key = (slot.doctor_id, slot.slot_date, slot.start_time);
        if !inner.slots.contains_key(&key) {
            return Err(StoreError::NotFound);
        }
        inner.slots.insert(key, slot.clone());
        Ok(slot.clone())
    }

    async fn release_time_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(slot) = inner.slots.get_mut(&(doctor_id, date, time)) {
            if !slot.is_blocked {
                slot.is_available = true;
            }
        }
        Ok(())
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<DoctorProfile>, StoreError> {
        Ok(self.inner.lock().await.doctors.get(&doctor_id).cloned())
    }
}
