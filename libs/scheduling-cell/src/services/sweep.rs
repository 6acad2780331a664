// libs/scheduling-cell/src/services/sweep.rs
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use shared_database::{Clock, SchedulingStore};
use shared_models::{ActorRole, AppointmentStatus, SchedulingError};

use crate::models::SweepReport;
use crate::services::lifecycle::LifecycleService;
use crate::services::map_store_error;

/// Periodic no-show sweep. Each pass moves approved appointments whose
/// start plus the grace period has elapsed to `no_show`, through the same
/// table-driven transition path as every other status change. A try-lock
/// guard keeps the sweep from overlapping itself; it runs freely alongside
/// ordinary booking traffic.
pub struct NoShowSweeper {
    store: Arc<dyn SchedulingStore>,
    clock: Arc<dyn Clock>,
    lifecycle: LifecycleService,
    guard: Mutex<()>,
    grace_minutes: i64,
}

impl NoShowSweeper {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        clock: Arc<dyn Clock>,
        grace_minutes: i64,
    ) -> Self {
        let lifecycle = LifecycleService::new(Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            clock,
            lifecycle,
            guard: Mutex::new(()),
            grace_minutes,
        }
    }

    pub async fn run_once(&self) -> Result<SweepReport, SchedulingError> {
        let _guard = match self.guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("no-show sweep already running, skipping this pass");
                return Ok(SweepReport {
                    skipped: true,
                    transitioned: 0,
                });
            }
        };

        let cutoff = self.clock.now() - Duration::minutes(self.grace_minutes);
        let overdue = self
            .store
            .approved_started_before(cutoff)
            .await
            .map_err(map_store_error)?;
        debug!("no-show sweep found {} overdue appointments", overdue.len());

        let mut transitioned = 0;
        for appointment in overdue {
            match self
                .lifecycle
                .update_status(
                    appointment.id,
                    AppointmentStatus::NoShow,
                    ActorRole::System,
                    None,
                )
                .await
            {
                Ok(_) => transitioned += 1,
                // Someone completed or cancelled it between the scan and
                // the transition; leave it alone.
                Err(SchedulingError::InvalidTransition { .. }) => {
                    warn!(
                        "appointment {} changed status mid-sweep, skipping",
                        appointment.id
                    );
                }
                Err(err) => return Err(err),
            }
        }

        if transitioned > 0 {
            info!("no-show sweep transitioned {} appointments", transitioned);
        }
        Ok(SweepReport {
            skipped: false,
            transitioned,
        })
    }
}
