// libs/scheduling-cell/src/services/conflict.rs
use chrono::{Duration, NaiveDate, NaiveTime};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::SchedulingStore;
use shared_models::{Appointment, ConflictKind, SchedulingError};

use crate::models::ConflictCheckResponse;
use crate::services::map_store_error;
use crate::services::slots::TimeSlotLedger;

/// Half-open interval overlap: [a, a+d1) and [b, b+d2) overlap iff
/// a < b+d2 and b < a+d1. Holds for unequal durations.
pub fn intervals_overlap(a: NaiveTime, d1: i32, b: NaiveTime, d2: i32) -> bool {
    let a_end = a + Duration::minutes(d1 as i64);
    let b_end = b + Duration::minutes(d2 as i64);
    a < b_end && b < a_end
}

#[derive(Clone)]
pub struct ConflictDetectionService {
    store: Arc<dyn SchedulingStore>,
    ledger: TimeSlotLedger,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn SchedulingStore>, ledger: TimeSlotLedger) -> Self {
        Self { store, ledger }
    }

    /// Checks a proposed booking in a fixed order, short-circuiting on the
    /// first failure: availability containment, the doctor's calendar, the
    /// patient's calendar, then explicit slot overrides. Store failures
    /// propagate as errors; a found conflict is a normal response.
    pub async fn detect_conflicts(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: i32,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, SchedulingError> {
        debug!(
            "conflict check for doctor {} on {} at {} ({} min)",
            doctor_id, date, time, duration_minutes
        );

        // 1. The requested interval must sit inside an effective window.
        let windows = self.ledger.effective_windows(doctor_id, date).await?;
        let inside = windows.iter().any(|w| w.contains(time, duration_minutes));
        if !inside {
            return Ok(ConflictCheckResponse::conflict(
                ConflictKind::OutsideAvailability,
                Some(format!(
                    "doctor has no availability covering {} to {} on {}",
                    time,
                    time + Duration::minutes(duration_minutes as i64),
                    date
                )),
            ));
        }

        // 2. The doctor's other non-terminal bookings that day.
        let doctor_rows = self
            .store
            .doctor_appointments_on(doctor_id, date)
            .await
            .map_err(map_store_error)?;
        if let Some(existing) = first_overlap(
            &doctor_rows,
            time,
            duration_minutes,
            exclude_appointment_id,
        ) {
            return Ok(ConflictCheckResponse::conflict(
                ConflictKind::DoctorBusy,
                Some(format!(
                    "overlaps the doctor's {} appointment at {}",
                    existing.status, existing.appointment_time
                )),
            ));
        }

        // 3. Same overlap rule against the patient's calendar.
        let patient_rows = self
            .store
            .patient_appointments_on(patient_id, date)
            .await
            .map_err(map_store_error)?;
        if let Some(existing) = first_overlap(
            &patient_rows,
            time,
            duration_minutes,
            exclude_appointment_id,
        ) {
            return Ok(ConflictCheckResponse::conflict(
                ConflictKind::PatientBusy,
                Some(format!(
                    "overlaps the patient's {} appointment at {}",
                    existing.status, existing.appointment_time
                )),
            ));
        }

        // 4. An explicit override for the exact (date, time) wins last.
        let slot = self
            .store
            .time_slot_at(doctor_id, date, time)
            .await
            .map_err(map_store_error)?;
        if let Some(slot) = slot {
            if !slot.is_bookable() {
                return Ok(ConflictCheckResponse::conflict(
                    ConflictKind::TimeSlotUnavailable,
                    slot.block_reason
                        .clone()
                        .or_else(|| Some("time slot is no longer available".to_string())),
                ));
            }
        }

        Ok(ConflictCheckResponse::clear())
    }
}

fn first_overlap<'a>(
    rows: &'a [Appointment],
    time: NaiveTime,
    duration_minutes: i32,
    exclude: Option<Uuid>,
) -> Option<&'a Appointment> {
    rows.iter().find(|a| {
        Some(a.id) != exclude
            && a.status.occupies_slot()
            && intervals_overlap(
                a.appointment_time,
                a.duration_minutes,
                time,
                duration_minutes,
            )
    })
}
