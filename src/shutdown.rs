//! Final flush when the monitor is cancelled.
use tracing::{info, warn};

use crate::{
    diagnostics::{Diagnostics, Event},
    error::StoreError,
    monitor::MonitorContext,
    status::{INACTIVE_STATE, ServiceStatus, now_timestamp},
    store::StatusStore,
};

/// Process exit code after a cancellation.
pub const CANCELLED_EXIT_CODE: i32 = -1;

/// Returns a copy of `snapshot` in which the record for `self_service_id` is inactive and
/// checked at `checked_at`. The flag reports whether such a record existed.
pub fn mark_self_inactive(
    snapshot: &[ServiceStatus],
    self_service_id: &str,
    checked_at: String,
) -> (Vec<ServiceStatus>, bool) {
    let mut found = false;
    let updated = snapshot
        .iter()
        .map(|record| {
            if record.service_id != self_service_id {
                return record.clone();
            }
            found = true;
            ServiceStatus {
                active_state: Some(INACTIVE_STATE.to_string()),
                timestamp_checked: Some(checked_at.clone()),
                ..record.clone()
            }
        })
        .collect();
    (updated, found)
}

/// Marks the monitor's own record inactive in the latest snapshot and writes it out.
///
/// Works with whatever the context holds, including an empty snapshot when cancellation
/// arrives before the first cycle.
pub fn shutdown(
    context: &MonitorContext,
    store: &StatusStore,
    self_service_id: &str,
    diagnostics: &Diagnostics,
) -> Result<(), StoreError> {
    let (snapshot, found) =
        mark_self_inactive(context.snapshot(), self_service_id, now_timestamp());
    if found {
        info!("Marking '{self_service_id}' inactive before exit");
    } else {
        warn!("No record for '{self_service_id}' in the snapshot; writing it unchanged");
    }

    store.save(&snapshot)?;
    diagnostics.emit(Event::MonitorStopped {
        service_id: self_service_id.to_string(),
        snapshot_path: store.path().to_path_buf(),
    });
    Ok(())
}
