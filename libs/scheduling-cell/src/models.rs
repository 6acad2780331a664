// libs/scheduling-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::{ActorRole, ConflictKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    /// Defaults to the configured slot length when absent.
    pub duration_minutes: Option<i32>,
    pub reason: String,
    pub fee: f64,
    pub patient_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    /// Keeps the current duration when absent.
    pub new_duration_minutes: Option<i32>,
    pub reason: String,
    pub requested_by: ActorRole,
}

/// Outcome of a conflict check. A found conflict is an expected business
/// result, so this is a value rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflict_type: Option<ConflictKind>,
    pub conflict_details: Option<String>,
}

impl ConflictCheckResponse {
    pub fn clear() -> Self {
        Self {
            has_conflict: false,
            conflict_type: None,
            conflict_details: None,
        }
    }

    pub fn conflict(kind: ConflictKind, details: Option<String>) -> Self {
        Self {
            has_conflict: true,
            conflict_type: Some(kind),
            conflict_details: details,
        }
    }
}

/// Result of a bulk slot-generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotGenerationReport {
    pub created: usize,
    /// Rows that already existed and were left untouched.
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HourlyCount {
    pub hour: u32,
    pub appointments: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingStats {
    pub total_slots: usize,
    pub available_slots: usize,
    pub booked_slots: usize,
    /// booked / total, 0 when there are no slots.
    pub utilization_rate: f64,
    pub peak_hours: Vec<HourlyCount>,
    /// Mean hours between booking and scheduled start, over approved and
    /// completed appointments in the range.
    pub average_lead_time_hours: f64,
}

/// Outcome of one no-show sweep pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// True when another pass already held the guard.
    pub skipped: bool,
    pub transitioned: usize,
}
