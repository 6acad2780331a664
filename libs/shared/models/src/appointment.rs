// libs/shared/models/src/appointment.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub reason: String,
    pub doctor_notes: Option<String>,
    pub patient_notes: Option<String>,
    pub rating: Option<i32>,
    pub review: Option<String>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub fee: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Scheduled start as a UTC instant.
    pub fn scheduled_start_time(&self) -> DateTime<Utc> {
        self.appointment_date.and_time(self.appointment_time).and_utc()
    }

    /// Scheduled end based on start time and duration.
    pub fn scheduled_end_time(&self) -> DateTime<Utc> {
        self.scheduled_start_time() + Duration::minutes(self.duration_minutes as i64)
    }

    /// Lead time between booking and the scheduled start.
    pub fn lead_time(&self) -> Duration {
        self.scheduled_start_time() - self.created_at
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Rejected,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    /// Terminal states are kept for history and never leave via the table.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::NoShow)
    }

    /// Whether an appointment in this status still holds its time slot.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Approved)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Approved => write!(f, "approved"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

/// Who is invoking an operation on an appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Doctor,
    Patient,
    System,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Doctor => write!(f, "doctor"),
            ActorRole::Patient => write!(f, "patient"),
            ActorRole::System => write!(f, "system"),
        }
    }
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// Explicit weekday enum so availability never round-trips through
/// locale-dependent strings or bare integers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        };
        write!(f, "{}", name)
    }
}

/// Recurring weekly open-hours window for a doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: DayOfWeek,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

/// Concrete, date-specific bookable unit. A row overrides the recurring
/// rule for exactly one (date, time); absence of a row means the recurring
/// rule alone governs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub is_available: bool,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeSlot {
    pub fn end_time(&self) -> NaiveTime {
        self.start_time + Duration::minutes(self.duration_minutes as i64)
    }

    /// A slot counts as bookable only when open and not blocked.
    pub fn is_bookable(&self) -> bool {
        self.is_available && !self.is_blocked
    }
}

/// The slice of the doctor directory this core reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub full_name: String,
    pub is_accepting_appointments: bool,
}

// ==============================================================================
// CONFLICT CLASSIFICATION
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    OutsideAvailability,
    DoctorBusy,
    PatientBusy,
    TimeSlotUnavailable,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::OutsideAvailability => write!(f, "outside_availability"),
            ConflictKind::DoctorBusy => write!(f, "doctor_busy"),
            ConflictKind::PatientBusy => write!(f, "patient_busy"),
            ConflictKind::TimeSlotUnavailable => write!(f, "time_slot_unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&AppointmentStatus::NoShow).unwrap();
        assert_eq!(json, "\"no_show\"");
        let back: AppointmentStatus = serde_json::from_str("\"no_show\"").unwrap();
        assert_eq!(back, AppointmentStatus::NoShow);
    }

    #[test]
    fn terminal_and_occupying_statuses_are_disjoint() {
        for status in AppointmentStatus::ALL {
            assert!(
                !(status.is_terminal() && status.occupies_slot()),
                "{} cannot be both terminal and slot-occupying",
                status
            );
        }
        assert!(AppointmentStatus::Pending.occupies_slot());
        assert!(AppointmentStatus::Approved.occupies_slot());
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::NoShow.is_terminal());
        assert!(!AppointmentStatus::Cancelled.is_terminal());
        assert!(!AppointmentStatus::Rejected.occupies_slot());
    }

    #[test]
    fn day_of_week_maps_from_chrono() {
        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert_eq!(DayOfWeek::from(monday.weekday()), DayOfWeek::Monday);
    }

    #[test]
    fn slot_end_time_follows_duration() {
        let slot = TimeSlot {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            slot_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 45,
            is_available: true,
            is_blocked: false,
            block_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(slot.end_time(), NaiveTime::from_hms_opt(9, 45, 0).unwrap());
        assert!(slot.is_bookable());
    }
}
