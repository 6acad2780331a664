// libs/scheduling-cell/src/services/lifecycle.rs
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use shared_database::{Clock, SchedulingStore};
use shared_models::{ActorRole, Appointment, AppointmentStatus, SchedulingError};

use crate::services::map_store_error;

/// Approved appointments may only be cancelled with more than this many
/// hours to spare.
pub const CANCELLATION_CUTOFF_HOURS: i64 = 2;

/// Grace period after the scheduled start before an approved appointment
/// counts as a no-show.
pub const NO_SHOW_GRACE_MINUTES: i64 = 30;

type Condition = fn(&Appointment, DateTime<Utc>) -> bool;

/// One row of the status machine. The table is the single source of truth
/// for which transitions exist; nothing transitions outside it.
pub struct TransitionRule {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
    pub allowed_roles: &'static [ActorRole],
    pub condition: Condition,
}

fn starts_in_future(appointment: &Appointment, now: DateTime<Utc>) -> bool {
    appointment.scheduled_start_time() > now
}

fn start_time_reached(appointment: &Appointment, now: DateTime<Utc>) -> bool {
    appointment.scheduled_start_time() <= now
}

fn outside_cancellation_cutoff(appointment: &Appointment, now: DateTime<Utc>) -> bool {
    appointment.scheduled_start_time() - now > Duration::hours(CANCELLATION_CUTOFF_HOURS)
}

fn no_show_grace_elapsed(appointment: &Appointment, now: DateTime<Utc>) -> bool {
    now >= appointment.scheduled_start_time() + Duration::minutes(NO_SHOW_GRACE_MINUTES)
}

pub const TRANSITION_TABLE: &[TransitionRule] = &[
    TransitionRule {
        from: AppointmentStatus::Pending,
        to: AppointmentStatus::Approved,
        allowed_roles: &[ActorRole::Doctor],
        condition: starts_in_future,
    },
    TransitionRule {
        from: AppointmentStatus::Pending,
        to: AppointmentStatus::Rejected,
        allowed_roles: &[ActorRole::Doctor],
        condition: starts_in_future,
    },
    TransitionRule {
        from: AppointmentStatus::Pending,
        to: AppointmentStatus::Cancelled,
        allowed_roles: &[ActorRole::Doctor, ActorRole::Patient],
        condition: starts_in_future,
    },
    TransitionRule {
        from: AppointmentStatus::Approved,
        to: AppointmentStatus::Completed,
        allowed_roles: &[ActorRole::Doctor],
        condition: start_time_reached,
    },
    TransitionRule {
        from: AppointmentStatus::Approved,
        to: AppointmentStatus::Cancelled,
        allowed_roles: &[ActorRole::Doctor, ActorRole::Patient],
        condition: outside_cancellation_cutoff,
    },
    TransitionRule {
        from: AppointmentStatus::Approved,
        to: AppointmentStatus::NoShow,
        allowed_roles: &[ActorRole::System, ActorRole::Doctor],
        condition: no_show_grace_elapsed,
    },
    // Rebooking: a cancelled or rejected appointment can be re-submitted
    // by the patient as long as its slot is still in the future.
    TransitionRule {
        from: AppointmentStatus::Cancelled,
        to: AppointmentStatus::Pending,
        allowed_roles: &[ActorRole::Patient],
        condition: starts_in_future,
    },
    TransitionRule {
        from: AppointmentStatus::Rejected,
        to: AppointmentStatus::Pending,
        allowed_roles: &[ActorRole::Patient],
        condition: starts_in_future,
    },
];

fn find_rule(from: AppointmentStatus, to: AppointmentStatus) -> Option<&'static TransitionRule> {
    TRANSITION_TABLE.iter().find(|r| r.from == from && r.to == to)
}

/// Whether the table permits moving `appointment` to `target` as `role`
/// at instant `now`. Pairs absent from the table are false for every role.
pub fn validate_transition(
    appointment: &Appointment,
    target: AppointmentStatus,
    role: ActorRole,
    now: DateTime<Utc>,
) -> bool {
    match find_rule(appointment.status, target) {
        Some(rule) => rule.allowed_roles.contains(&role) && (rule.condition)(appointment, now),
        None => false,
    }
}

/// Every target status `role` could move this appointment to right now.
pub fn allowed_transitions(
    appointment: &Appointment,
    role: ActorRole,
    now: DateTime<Utc>,
) -> Vec<AppointmentStatus> {
    TRANSITION_TABLE
        .iter()
        .filter(|rule| {
            rule.from == appointment.status
                && rule.allowed_roles.contains(&role)
                && (rule.condition)(appointment, now)
        })
        .map(|rule| rule.to)
        .collect()
}

/// Executes validated status transitions and post-completion amendments.
#[derive(Clone)]
pub struct LifecycleService {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn SchedulingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Loads the appointment, validates the requested transition against
    /// the table, and persists the new status with the note attributed to
    /// the invoker's field.
    pub async fn update_status(
        &self,
        appointment_id: uuid::Uuid,
        target: AppointmentStatus,
        role: ActorRole,
        note: Option<String>,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self
            .store
            .get_appointment(appointment_id)
            .await
            .map_err(map_store_error)?
            .ok_or(SchedulingError::NotFound)?;

        let now = self.clock.now();
        debug!(
            "validating transition {} -> {} as {} for appointment {}",
            appointment.status, target, role, appointment_id
        );

        if !validate_transition(&appointment, target, role, now) {
            warn!(
                "rejected transition {} -> {} as {} for appointment {}",
                appointment.status, target, role, appointment_id
            );
            return Err(SchedulingError::InvalidTransition {
                from: appointment.status,
                to: target,
                role,
            });
        }

        appointment.status = target;
        attribute_note(&mut appointment, role, note);
        appointment.updated_at = now;

        let saved = self
            .store
            .update_appointment(&appointment)
            .await
            .map_err(map_store_error)?;

        info!(
            "appointment {} transitioned to {} by {}",
            appointment_id, target, role
        );
        Ok(saved)
    }

    /// Post-completion amendment. This is a field update on a terminal
    /// appointment, not a state change, so it lives outside the table:
    /// notes may come from either side, rating and review only from the
    /// patient, and the rating must be 1 to 5.
    pub async fn amend_completed(
        &self,
        appointment_id: uuid::Uuid,
        role: ActorRole,
        note: Option<String>,
        rating: Option<i32>,
        review: Option<String>,
    ) -> Result<Appointment, SchedulingError> {
        let mut appointment = self
            .store
            .get_appointment(appointment_id)
            .await
            .map_err(map_store_error)?
            .ok_or(SchedulingError::NotFound)?;

        if appointment.status != AppointmentStatus::Completed {
            return Err(SchedulingError::Validation(format!(
                "only completed appointments can be amended, current status is {}",
                appointment.status
            )));
        }
        if (rating.is_some() || review.is_some()) && role != ActorRole::Patient {
            return Err(SchedulingError::Validation(
                "rating and review may only be set by the patient".to_string(),
            ));
        }
        if let Some(value) = rating {
            if !(1..=5).contains(&value) {
                return Err(SchedulingError::Validation(
                    "rating must be between 1 and 5".to_string(),
                ));
            }
            appointment.rating = Some(value);
        }
        if review.is_some() {
            appointment.review = review;
        }
        attribute_note(&mut appointment, role, note);
        appointment.updated_at = self.clock.now();

        self.store
            .update_appointment(&appointment)
            .await
            .map_err(map_store_error)
    }
}

fn attribute_note(appointment: &mut Appointment, role: ActorRole, note: Option<String>) {
    if let Some(text) = note {
        match role {
            ActorRole::Patient => appointment.patient_notes = Some(text),
            ActorRole::Doctor | ActorRole::System => appointment.doctor_notes = Some(text),
        }
    }
}
