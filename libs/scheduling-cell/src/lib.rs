// libs/scheduling-cell/src/lib.rs
pub mod models;
pub mod services;

pub use models::{
    ConflictCheckResponse, CreateAppointmentRequest, HourlyCount, RescheduleRequest,
    SchedulingStats, SlotGenerationReport, SweepReport,
};
pub use services::booking::AppointmentBookingService;
pub use services::conflict::ConflictDetectionService;
pub use services::lifecycle::{
    allowed_transitions, validate_transition, LifecycleService, TransitionRule, TRANSITION_TABLE,
};
pub use services::slots::TimeSlotLedger;
pub use services::sweep::NoShowSweeper;
