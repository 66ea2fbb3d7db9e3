//! Merges a fresh probe with the previously persisted record for the same service.
use crate::status::ServiceStatus;

/// Derives the record to persist from the previous record (if any) and a fresh probe.
///
/// The manager-reported fields (`active_state`, `sub_state`, `timestamp_started` and
/// `timestamp_checked`) are taken from `current` where it has them; everything else is
/// carried over from `previous`. `timestamp_last_active` only moves when `current` is active,
/// and then forward to `current.timestamp_checked`; a clock that steps back never rewinds it.
pub fn reconcile(previous: Option<&ServiceStatus>, current: ServiceStatus) -> ServiceStatus {
    let active = current.is_active();
    let checked = current.timestamp_checked.clone();

    let mut merged = match previous {
        None => current,
        Some(previous) => {
            let mut merged = previous.clone();
            overwrite(&mut merged.active_state, current.active_state);
            overwrite(&mut merged.sub_state, current.sub_state);
            overwrite(&mut merged.timestamp_started, current.timestamp_started);
            overwrite(&mut merged.timestamp_checked, current.timestamp_checked);
            merged
        }
    };

    if let Some(checked) = checked.filter(|_| active) {
        let newer = merged
            .timestamp_last_active
            .as_ref()
            .is_none_or(|last| &checked > last);
        if newer {
            merged.timestamp_last_active = Some(checked);
        }
    }

    merged
}

fn overwrite(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}
