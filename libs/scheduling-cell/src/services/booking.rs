// libs/scheduling-cell/src/services/booking.rs
use chrono::{Duration, NaiveDate, Timelike};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::{Clock, IdentityResolver, SchedulingStore, StoreError};
use shared_models::{
    ActorRole, Appointment, AppointmentStatus, ConflictKind, SchedulingError,
};

use crate::models::{
    ConflictCheckResponse, CreateAppointmentRequest, HourlyCount, RescheduleRequest,
    SchedulingStats, SlotGenerationReport,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::LifecycleService;
use crate::services::map_store_error;
use crate::services::slots::TimeSlotLedger;

/// Front door for scheduling operations. Composes the ledger, the conflict
/// detector and the status machine over one shared store; constructed once
/// at process start and handed to request handlers by reference.
pub struct AppointmentBookingService {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
    identity: Arc<dyn IdentityResolver>,
    lifecycle: LifecycleService,
    conflict: ConflictDetectionService,
    ledger: TimeSlotLedger,
    config: SchedulingConfig,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        clock: Arc<dyn Clock>,
        identity: Arc<dyn IdentityResolver>,
        config: SchedulingConfig,
    ) -> Self {
        let ledger = TimeSlotLedger::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.default_slot_minutes,
        );
        let conflict = ConflictDetectionService::new(Arc::clone(&store), ledger.clone());
        let lifecycle = LifecycleService::new(Arc::clone(&store), Arc::clone(&clock));

        Self {
            store,
            clock,
            identity,
            lifecycle,
            conflict,
            ledger,
            config,
        }
    }

    pub fn lifecycle(&self) -> &LifecycleService {
        &self.lifecycle
    }

    pub fn ledger(&self) -> &TimeSlotLedger {
        &self.ledger
    }

    /// Validates the request, checks for conflicts, then persists the new
    /// pending appointment and its slot reservation as one atomic store
    /// unit. A uniqueness race at commit re-runs detection once so the
    /// caller gets a real conflict reason instead of a constraint error.
    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        requester_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let duration = request
            .duration_minutes
            .unwrap_or(self.config.default_slot_minutes);
        if duration <= 0 {
            return Err(SchedulingError::Validation(
                "duration must be positive".to_string(),
            ));
        }
        if request.fee < 0.0 {
            return Err(SchedulingError::Validation(
                "fee cannot be negative".to_string(),
            ));
        }
        let reason = request.reason.trim();
        if reason.chars().count() < self.config.min_reason_chars {
            return Err(SchedulingError::Validation(format!(
                "reason must be at least {} characters",
                self.config.min_reason_chars
            )));
        }

        let now = self.clock.now();
        let start = request
            .appointment_date
            .and_time(request.appointment_time)
            .and_utc();
        if start <= now {
            return Err(SchedulingError::Validation(
                "appointment must be scheduled in the future".to_string(),
            ));
        }
        self.check_business_hours(request.appointment_time, duration)?;

        let doctor = self
            .store
            .get_doctor(request.doctor_id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| SchedulingError::Validation("unknown doctor".to_string()))?;
        if !doctor.is_accepting_appointments {
            return Err(SchedulingError::Validation(format!(
                "{} is not currently accepting appointments",
                doctor.full_name
            )));
        }

        let requester_role = self
            .identity
            .role_of(requester_id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| SchedulingError::Validation("unknown requester".to_string()))?;
        debug!(
            "create request from {} ({}) for doctor {}",
            requester_id, requester_role, request.doctor_id
        );

        let check = self
            .conflict
            .detect_conflicts(
                request.doctor_id,
                request.patient_id,
                request.appointment_date,
                request.appointment_time,
                duration,
                None,
            )
            .await?;
        if let Some(err) = conflict_error(&check) {
            return Err(err);
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_id: request.patient_id,
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            duration_minutes: duration,
            status: AppointmentStatus::Pending,
            reason: reason.to_string(),
            doctor_notes: None,
            patient_notes: request.patient_notes,
            rating: None,
            review: None,
            follow_up_required: false,
            follow_up_date: None,
            fee: request.fee,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_appointment(&appointment).await {
            Ok(saved) => {
                info!(
                    "appointment {} created for doctor {} on {} at {}",
                    saved.id, saved.doctor_id, saved.appointment_date, saved.appointment_time
                );
                Ok(saved)
            }
            Err(StoreError::UniqueViolation) => {
                warn!(
                    "commit race on doctor {} at {} {}, re-running conflict check",
                    request.doctor_id, request.appointment_date, request.appointment_time
                );
                self.conflict_after_race(
                    request.doctor_id,
                    request.patient_id,
                    request.appointment_date,
                    request.appointment_time,
                    duration,
                    None,
                )
                .await
            }
            Err(err) => Err(map_store_error(err)),
        }
    }

    /// Moves a pending or approved appointment to a new (date, time),
    /// releasing the old slot and reserving the new one atomically. An
    /// approved appointment rescheduled by the patient drops back to
    /// pending for re-approval; a doctor keeps the approval.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        request: RescheduleRequest,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .store
            .get_appointment(appointment_id)
            .await
            .map_err(map_store_error)?
            .ok_or(SchedulingError::NotFound)?;

        if !matches!(
            appointment.status,
            AppointmentStatus::Pending | AppointmentStatus::Approved
        ) {
            return Err(SchedulingError::Validation(format!(
                "only pending or approved appointments can be rescheduled, current status is {}",
                appointment.status
            )));
        }

        let duration = request
            .new_duration_minutes
            .unwrap_or(appointment.duration_minutes);
        if duration <= 0 {
            return Err(SchedulingError::Validation(
                "duration must be positive".to_string(),
            ));
        }

        let now = self.clock.now();
        let new_start = request.new_date.and_time(request.new_time).and_utc();
        if new_start <= now {
            return Err(SchedulingError::Validation(
                "appointment must be rescheduled into the future".to_string(),
            ));
        }
        self.check_business_hours(request.new_time, duration)?;

        let check = self
            .conflict
            .detect_conflicts(
                appointment.doctor_id,
                appointment.patient_id,
                request.new_date,
                request.new_time,
                duration,
                Some(appointment_id),
            )
            .await?;
        if let Some(err) = conflict_error(&check) {
            return Err(err);
        }

        let old_date = appointment.appointment_date;
        let old_time = appointment.appointment_time;

        let mut updated = appointment;
        updated.appointment_date = request.new_date;
        updated.appointment_time = request.new_time;
        updated.duration_minutes = duration;
        if updated.status == AppointmentStatus::Approved
            && request.requested_by == ActorRole::Patient
        {
            // Re-approval required when the patient moves an approved slot.
            updated.status = AppointmentStatus::Pending;
        }
        match request.requested_by {
            ActorRole::Patient => updated.patient_notes = Some(request.reason.clone()),
            ActorRole::Doctor | ActorRole::System => {
                updated.doctor_notes = Some(request.reason.clone())
            }
        }
        updated.updated_at = now;

        match self.store.move_appointment(&updated, old_date, old_time).await {
            Ok(saved) => {
                info!(
                    "appointment {} rescheduled to {} at {} by {}",
                    saved.id, saved.appointment_date, saved.appointment_time, request.requested_by
                );
                Ok(saved)
            }
            Err(StoreError::UniqueViolation) => {
                warn!(
                    "commit race rescheduling appointment {}, re-running conflict check",
                    appointment_id
                );
                self.conflict_after_race(
                    updated.doctor_id,
                    updated.patient_id,
                    request.new_date,
                    request.new_time,
                    duration,
                    Some(appointment_id),
                )
                .await
            }
            Err(err) => Err(map_store_error(err)),
        }
    }

    /// Cancels through the status machine, then frees the slot. Approved
    /// appointments inside the cutoff window are refused outright with
    /// `CancellationTooLate` rather than a bare transition error.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        reason: String,
        cancelled_by: ActorRole,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .store
            .get_appointment(appointment_id)
            .await
            .map_err(map_store_error)?
            .ok_or(SchedulingError::NotFound)?;

        let now = self.clock.now();
        if appointment.status == AppointmentStatus::Approved
            && appointment.scheduled_start_time() - now
                <= Duration::hours(self.config.cancellation_cutoff_hours)
        {
            return Err(SchedulingError::CancellationTooLate);
        }

        let cancelled = self
            .lifecycle
            .update_status(
                appointment_id,
                AppointmentStatus::Cancelled,
                cancelled_by,
                Some(reason),
            )
            .await?;

        self.store
            .release_time_slot(
                cancelled.doctor_id,
                cancelled.appointment_date,
                cancelled.appointment_time,
            )
            .await
            .map_err(map_store_error)?;

        info!("appointment {} cancelled by {}", appointment_id, cancelled_by);
        Ok(cancelled)
    }

    /// Slot and booking aggregates over a date range.
    pub async fn scheduling_stats(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<SchedulingStats, SchedulingError> {
        if end_date < start_date {
            return Err(SchedulingError::Validation(
                "end date precedes start date".to_string(),
            ));
        }

        let slots = self
            .store
            .time_slots_between(doctor_id, start_date, end_date)
            .await
            .map_err(map_store_error)?;
        let total_slots = slots.len();
        let available_slots = slots.iter().filter(|s| s.is_bookable()).count();
        let booked_slots = slots
            .iter()
            .filter(|s| !s.is_available && !s.is_blocked)
            .count();
        let utilization_rate = if total_slots == 0 {
            0.0
        } else {
            booked_slots as f64 / total_slots as f64
        };

        let appointments = self
            .store
            .doctor_appointments_between(doctor_id, start_date, end_date)
            .await
            .map_err(map_store_error)?;

        let mut by_hour: BTreeMap<u32, u64> = BTreeMap::new();
        for appointment in &appointments {
            *by_hour.entry(appointment.appointment_time.hour()).or_insert(0) += 1;
        }
        let peak_hours = by_hour
            .into_iter()
            .map(|(hour, appointments)| HourlyCount { hour, appointments })
            .collect();

        let lead_times: Vec<f64> = appointments
            .iter()
            .filter(|a| {
                matches!(
                    a.status,
                    AppointmentStatus::Approved | AppointmentStatus::Completed
                )
            })
            .map(|a| a.lead_time().num_minutes() as f64 / 60.0)
            .collect();
        let average_lead_time_hours = if lead_times.is_empty() {
            0.0
        } else {
            lead_times.iter().sum::<f64>() / lead_times.len() as f64
        };

        Ok(SchedulingStats {
            total_slots,
            available_slots,
            booked_slots,
            utilization_rate,
            peak_hours,
            average_lead_time_hours,
        })
    }

    pub async fn detect_conflicts(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        time: chrono::NaiveTime,
        duration_minutes: i32,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheckResponse, SchedulingError> {
        self.conflict
            .detect_conflicts(
                doctor_id,
                patient_id,
                date,
                time,
                duration_minutes,
                exclude_appointment_id,
            )
            .await
    }

    pub async fn generate_slots(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        slot_minutes: i32,
        buffer_minutes: i32,
    ) -> Result<SlotGenerationReport, SchedulingError> {
        self.ledger
            .generate_slots(doctor_id, start_date, end_date, slot_minutes, buffer_minutes)
            .await
    }

    fn check_business_hours(
        &self,
        time: chrono::NaiveTime,
        duration_minutes: i32,
    ) -> Result<(), SchedulingError> {
        let end = time + Duration::minutes(duration_minutes as i64);
        if end <= time
            || time < self.config.business_day_start
            || end > self.config.business_day_end
        {
            return Err(SchedulingError::Validation(format!(
                "appointment must fall within business hours {} to {}",
                self.config.business_day_start, self.config.business_day_end
            )));
        }
        Ok(())
    }

    /// Single retry after a uniqueness race: re-run detection so the caller
    /// sees an accurate conflict reason. If the racing booking has already
    /// vanished again, report the doctor as busy rather than succeeding.
    async fn conflict_after_race(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        time: chrono::NaiveTime,
        duration_minutes: i32,
        exclude: Option<Uuid>,
    ) -> Result<Appointment, SchedulingError> {
        let recheck = self
            .conflict
            .detect_conflicts(doctor_id, patient_id, date, time, duration_minutes, exclude)
            .await?;
        match conflict_error(&recheck) {
            Some(err) => Err(err),
            None => Err(SchedulingError::Conflict {
                kind: ConflictKind::DoctorBusy,
                detail: Some("slot was taken by a concurrent booking".to_string()),
            }),
        }
    }
}

fn conflict_error(check: &ConflictCheckResponse) -> Option<SchedulingError> {
    if !check.has_conflict {
        return None;
    }
    Some(SchedulingError::Conflict {
        kind: check.conflict_type.unwrap_or(ConflictKind::DoctorBusy),
        detail: check.conflict_details.clone(),
    })
}
