// libs/scheduling-cell/src/services/mod.rs
pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod slots;
pub mod sweep;

use shared_database::StoreError;
use shared_models::{ConflictKind, SchedulingError};

/// Default mapping from store failures to the caller-facing taxonomy.
/// A uniqueness violation means another booking won the slot key, which
/// callers see as a doctor-side conflict unless the orchestrator can
/// re-run detection for a more precise reason.
pub(crate) fn map_store_error(err: StoreError) -> SchedulingError {
    match err {
        StoreError::NotFound => SchedulingError::NotFound,
        StoreError::UniqueViolation => SchedulingError::Conflict {
            kind: ConflictKind::DoctorBusy,
            detail: None,
        },
        StoreError::Unavailable(msg) => SchedulingError::ServiceUnavailable(msg),
    }
}
