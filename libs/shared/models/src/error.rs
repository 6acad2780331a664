// libs/shared/models/src/error.rs
use thiserror::Error;

use crate::appointment::{ActorRole, AppointmentStatus, ConflictKind};

/// Error taxonomy for the scheduling core. Every variant carries a stable
/// machine-readable code so callers can branch without string matching.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchedulingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid status transition {from} -> {to} for role {role}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
        role: ActorRole,
    },

    #[error("booking conflict: {kind}")]
    Conflict {
        kind: ConflictKind,
        detail: Option<String>,
    },

    #[error("cancellation window has closed")]
    CancellationTooLate,

    #[error("appointment not found")]
    NotFound,

    #[error("scheduling store unavailable: {0}")]
    ServiceUnavailable(String),
}

impl SchedulingError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulingError::Validation(_) => "validation_error",
            SchedulingError::InvalidTransition { .. } => "invalid_transition",
            SchedulingError::Conflict { .. } => "booking_conflict",
            SchedulingError::CancellationTooLate => "cancellation_too_late",
            SchedulingError::NotFound => "not_found",
            SchedulingError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    /// Only transport/store failures are worth retrying; everything else
    /// needs different input or a different time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SchedulingError::ServiceUnavailable(_))
    }
}
