pub mod appointment;
pub mod error;

pub use appointment::{
    ActorRole, Appointment, AppointmentStatus, AvailabilityRule, ConflictKind, DayOfWeek,
    DoctorProfile, TimeSlot,
};
pub use error::SchedulingError;
