//! The persisted per-service status record.
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Format shared by every timestamp svcwatch persists, so values compare lexicographically.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Suffix stripped from a unit id to derive its display name.
pub const SERVICE_SUFFIX: &str = ".service";

/// `ActiveState` value that marks a service as up.
pub const ACTIVE_STATE: &str = "active";

/// `ActiveState` value forced onto the monitor's own record at shutdown.
pub const INACTIVE_STATE: &str = "inactive";

/// Formats a local time the way every persisted timestamp is written.
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current local time, formatted for persistence.
pub fn now_timestamp() -> String {
    format_timestamp(Local::now())
}

/// Strips the conventional `.service` suffix from a unit id.
pub fn service_name_from_id(service_id: &str) -> &str {
    service_id.strip_suffix(SERVICE_SUFFIX).unwrap_or(service_id)
}

/// Turns a bare name like `nginx` into the unit id `nginx.service`.
///
/// Names that already carry a unit type (`foo.service`, `bar.timer`) are kept.
pub fn normalize_service_id(name: &str) -> String {
    let name = name.trim();
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{name}{SERVICE_SUFFIX}")
    }
}

/// Last known state of one monitored service.
///
/// Everything except `service_id` is optional so hand-edited snapshots still load, and
/// unknown values are omitted from the JSON rather than written as placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Unit id reported by the service manager; primary key of the snapshot.
    pub service_id: String,
    /// `service_id` without the `.service` suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_state: Option<String>,
    /// Main process start time as reported by the manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_started: Option<String>,
    /// When this record was last probed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_checked: Option<String>,
    /// When the service was last observed with `active_state == "active"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_last_active: Option<String>,
    /// User the probe ran as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl ServiceStatus {
    /// Creates an otherwise empty record for `service_id`, deriving its display name.
    pub fn new(service_id: impl Into<String>) -> Self {
        let service_id = service_id.into();
        let service_name = Some(service_name_from_id(&service_id).to_string());
        Self {
            service_id,
            service_name,
            active_state: None,
            sub_state: None,
            timestamp_started: None,
            timestamp_checked: None,
            timestamp_last_active: None,
            account: None,
        }
    }

    /// Whether the record reports the service as active. A missing state counts as not active.
    pub fn is_active(&self) -> bool {
        self.active_state.as_deref() == Some(ACTIVE_STATE)
    }
}
