// libs/scheduling-cell/src/services/slots.rs
use chrono::{Duration, NaiveDate, NaiveTime};
use std::sync::Arc;
use uuid::Uuid;

use shared_database::{Clock, SchedulingStore};
use shared_models::{DayOfWeek, SchedulingError, TimeSlot};

use crate::models::SlotGenerationReport;
use crate::services::map_store_error;
use chrono::Datelike;
use tracing::{debug, info, warn};

/// A contiguous stretch of bookable time within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Window {
    /// Whether [start, start+duration) fits entirely inside this window.
    pub fn contains(&self, start: NaiveTime, duration_minutes: i32) -> bool {
        let end = start + Duration::minutes(duration_minutes as i64);
        // NaiveTime arithmetic wraps at midnight; a wrapped end never fits.
        end > start && start >= self.start && end <= self.end
    }
}

/// Resolves effective bookable time for a doctor by merging recurring
/// weekly rules with date-specific slot overrides. Nothing is cached;
/// every query recomputes from the store.
#[derive(Clone)]
pub struct TimeSlotLedger {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
    default_slot_minutes: i32,
}

impl TimeSlotLedger {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        clock: Arc<dyn Clock>,
        default_slot_minutes: i32,
    ) -> Self {
        Self {
            store,
            clock,
            default_slot_minutes,
        }
    }

    /// Effective availability windows for one date: the recurring rules
    /// for that weekday plus any open overrides (exceptional hours the
    /// doctor added for that date only), merged so overlapping stretches
    /// collapse into one window. Blocked overrides do not widen or shrink
    /// windows here; they knock out exact time points, which
    /// `candidate_slots` and the conflict detector check per slot.
    pub async fn effective_windows(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Window>, SchedulingError> {
        let day = DayOfWeek::from(date.weekday());
        let rules = self
            .store
            .availability_rules_for(doctor_id, day)
            .await
            .map_err(map_store_error)?;

        let mut windows: Vec<Window> = rules
            .iter()
            .filter(|rule| rule.is_available)
            .map(|rule| Window {
                start: rule.start_time,
                end: rule.end_time,
            })
            .collect();

        let overrides = self
            .store
            .time_slots_between(doctor_id, date, date)
            .await
            .map_err(map_store_error)?;
        for slot in overrides.iter().filter(|s| s.is_bookable()) {
            windows.push(Window {
                start: slot.start_time,
                end: slot.end_time(),
            });
        }

        windows.sort_by_key(|w| (w.start, w.end));
        let mut merged: Vec<Window> = Vec::new();
        for window in windows {
            match merged.last_mut() {
                Some(last) if window.start <= last.end => {
                    if window.end > last.end {
                        last.end = window.end;
                    }
                }
                _ => merged.push(window),
            }
        }
        Ok(merged)
    }

    /// Finite sequence of bookable (time, duration) candidates for a date,
    /// stepping through each effective window and skipping times knocked
    /// out by a blocked or closed override.
    pub async fn candidate_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        duration_minutes: i32,
    ) -> Result<Vec<(NaiveTime, i32)>, SchedulingError> {
        let windows = self.effective_windows(doctor_id, date).await?;
        let overrides = self
            .store
            .time_slots_between(doctor_id, date, date)
            .await
            .map_err(map_store_error)?;

        let mut candidates = Vec::new();
        for window in &windows {
            let mut cursor = window.start;
            while window.contains(cursor, duration_minutes) {
                let knocked_out = overrides
                    .iter()
                    .any(|s| s.start_time == cursor && !s.is_bookable());
                if !knocked_out {
                    candidates.push((cursor, duration_minutes));
                }
                cursor = cursor + Duration::minutes(duration_minutes as i64);
            }
        }
        Ok(candidates)
    }

    /// Materializes slot rows across a date range from the recurring
    /// availability. Idempotent: rows that already exist for a
    /// (doctor, date, time) are skipped, so re-runs never duplicate or
    /// clobber manually blocked slots. Per-date store failures are
    /// recorded and the walk continues.
    pub async fn generate_slots(
        &self,
        doctor_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        slot_minutes: i32,
        buffer_minutes: i32,
    ) -> Result<SlotGenerationReport, SchedulingError> {
        if slot_minutes <= 0 {
            return Err(SchedulingError::Validation(
                "slot duration must be positive".to_string(),
            ));
        }
        if buffer_minutes < 0 {
            return Err(SchedulingError::Validation(
                "slot buffer cannot be negative".to_string(),
            ));
        }
        if end_date < start_date {
            return Err(SchedulingError::Validation(
                "end date precedes start date".to_string(),
            ));
        }

        let step = Duration::minutes((slot_minutes + buffer_minutes) as i64);
        let now = self.clock.now();
        let mut report = SlotGenerationReport::default();

        let mut date = start_date;
        while date <= end_date {
            let day = DayOfWeek::from(date.weekday());
            let rules = match self.store.availability_rules_for(doctor_id, day).await {
                Ok(rules) => rules,
                Err(err) => {
                    warn!("slot generation skipped {}: {}", date, err);
                    report.errors.push(format!("{}: {}", date, err));
                    date = date + Duration::days(1);
                    continue;
                }
            };

            for rule in rules.iter().filter(|r| r.is_available) {
                let window = Window {
                    start: rule.start_time,
                    end: rule.end_time,
                };
                let mut cursor = window.start;
                while window.contains(cursor, slot_minutes) {
                    let slot = TimeSlot {
                        id: Uuid::new_v4(),
                        doctor_id,
                        slot_date: date,
                        start_time: cursor,
                        duration_minutes: slot_minutes,
                        is_available: true,
                        is_blocked: false,
                        block_reason: None,
                        created_at: now,
                        updated_at: now,
                    };
                    match self.store.insert_time_slot(&slot).await {
                        Ok(true) => report.created += 1,
                        Ok(false) => report.skipped += 1,
                        Err(err) => {
                            report.errors.push(format!("{} {}: {}", date, cursor, err));
                        }
                    }
                    cursor = cursor + step;
                }
            }
            date = date + Duration::days(1);
        }

        info!(
            "generated {} slots for doctor {} ({} existing, {} errors)",
            report.created,
            doctor_id,
            report.skipped,
            report.errors.len()
        );
        Ok(report)
    }

    /// Marks one (date, time) unbookable, creating the override row if the
    /// recurring rule alone governed it so far.
    pub async fn block_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        reason: Option<String>,
    ) -> Result<TimeSlot, SchedulingError> {
        let now = self.clock.now();
        let existing = self
            .store
            .time_slot_at(doctor_id, date, time)
            .await
            .map_err(map_store_error)?;

        let slot = match existing {
            Some(mut slot) => {
                slot.is_available = false;
                slot.is_blocked = true;
                slot.block_reason = reason;
                slot.updated_at = now;
                self.store
                    .update_time_slot(&slot)
                    .await
                    .map_err(map_store_error)?
            }
            None => {
                let slot = TimeSlot {
                    id: Uuid::new_v4(),
                    doctor_id,
                    slot_date: date,
                    start_time: time,
                    duration_minutes: self.default_slot_minutes,
                    is_available: false,
                    is_blocked: true,
                    block_reason: reason,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .insert_time_slot(&slot)
                    .await
                    .map_err(map_store_error)?;
                slot
            }
        };

        debug!("blocked slot {} {} for doctor {}", date, time, doctor_id);
        Ok(slot)
    }

    /// Opens exceptional hours at one (date, time), outside or inside the
    /// recurring rules.
    pub async fn open_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: i32,
    ) -> Result<TimeSlot, SchedulingError> {
        if duration_minutes <= 0 {
            return Err(SchedulingError::Validation(
                "slot duration must be positive".to_string(),
            ));
        }

        let now = self.clock.now();
        let existing = self
            .store
            .time_slot_at(doctor_id, date, time)
            .await
            .map_err(map_store_error)?;

        let slot = match existing {
            Some(mut slot) => {
                slot.is_available = true;
                slot.is_blocked = false;
                slot.block_reason = None;
                slot.duration_minutes = duration_minutes;
                slot.updated_at = now;
                self.store
                    .update_time_slot(&slot)
                    .await
                    .map_err(map_store_error)?
            }
            None => {
                let slot = TimeSlot {
                    id: Uuid::new_v4(),
                    doctor_id,
                    slot_date: date,
                    start_time: time,
                    duration_minutes,
                    is_available: true,
                    is_blocked: false,
                    block_reason: None,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .insert_time_slot(&slot)
                    .await
                    .map_err(map_store_error)?;
                slot
            }
        };

        debug!("opened slot {} {} for doctor {}", date, time, doctor_id);
        Ok(slot)
    }
}
