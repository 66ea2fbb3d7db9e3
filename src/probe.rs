//! Queries the service manager for the current state of one service.
use std::{
    env,
    path::PathBuf,
    process::{Command, Stdio},
    str::FromStr,
};

use nix::unistd::{User, geteuid};
use strum_macros::{AsRefStr, EnumString};
use tracing::debug;

use crate::{
    error::ProbeError,
    status::{ServiceStatus, now_timestamp},
};

/// Anything that can report the current state of a named service.
pub trait ServiceProber {
    /// Probes `service_name` once, stamping the result with the probe time.
    fn probe(&self, service_name: &str) -> Result<ServiceStatus, ProbeError>;
}

/// Properties requested from `systemctl show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
enum ShowProperty {
    Id,
    ActiveState,
    SubState,
    ExecMainStartTimestamp,
    LoadState,
}

const PROPERTIES: [ShowProperty; 5] = [
    ShowProperty::Id,
    ShowProperty::ActiveState,
    ShowProperty::SubState,
    ShowProperty::ExecMainStartTimestamp,
    ShowProperty::LoadState,
];

const LOAD_STATE_NOT_FOUND: &str = "not-found";

/// Probes services through `systemctl show`.
#[derive(Debug, Clone)]
pub struct SystemctlProber {
    command: PathBuf,
    user_mode: bool,
    account: String,
}

impl SystemctlProber {
    /// Creates a prober that runs `command` (normally `systemctl`), optionally against the
    /// user's service manager.
    pub fn new(command: impl Into<PathBuf>, user_mode: bool) -> Self {
        Self {
            command: command.into(),
            user_mode,
            account: current_account(),
        }
    }

    /// The account recorded on every probe result.
    pub fn account(&self) -> &str {
        &self.account
    }

    fn show(&self, service_name: &str) -> Result<String, ProbeError> {
        let properties = PROPERTIES
            .iter()
            .map(|property| property.as_ref())
            .collect::<Vec<_>>()
            .join(",");

        let mut cmd = Command::new(&self.command);
        if self.user_mode {
            cmd.arg("--user");
        }
        cmd.arg("show")
            .arg(service_name)
            .arg(format!("--property={properties}"))
            .stdin(Stdio::null());

        debug!("Probing '{service_name}' with {:?}", cmd);
        let output = cmd.output().map_err(|source| ProbeError::SpawnError {
            service: service_name.to_string(),
            command: self.command.display().to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(ProbeError::CommandFailed {
                service: service_name.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|err| ProbeError::Unparseable {
            service: service_name.to_string(),
            reason: err.to_string(),
        })
    }
}

impl ServiceProber for SystemctlProber {
    fn probe(&self, service_name: &str) -> Result<ServiceStatus, ProbeError> {
        let stdout = self.show(service_name)?;
        let mut status = parse_show_output(service_name, &stdout)?;
        status.timestamp_checked = Some(now_timestamp());
        status.account = Some(self.account.clone());
        Ok(status)
    }
}

/// Parses the `key=value` lines printed by `systemctl show`.
///
/// Only manager-reported fields are filled in; the probe time and account are left to the caller.
pub fn parse_show_output(service_name: &str, stdout: &str) -> Result<ServiceStatus, ProbeError> {
    let mut id = None;
    let mut active_state = None;
    let mut sub_state = None;
    let mut started = None;
    let mut load_state = None;

    for line in stdout.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let Ok(property) = ShowProperty::from_str(key.trim()) else {
            continue;
        };
        match property {
            ShowProperty::Id => id = Some(value.to_string()),
            ShowProperty::ActiveState => active_state = Some(value.to_string()),
            ShowProperty::SubState => sub_state = Some(value.to_string()),
            ShowProperty::ExecMainStartTimestamp => started = repair_start_timestamp(value),
            ShowProperty::LoadState => load_state = Some(value.to_string()),
        }
    }

    if load_state.as_deref() == Some(LOAD_STATE_NOT_FOUND) {
        return Err(ProbeError::UnknownService(service_name.to_string()));
    }

    let id = id.ok_or_else(|| ProbeError::Unparseable {
        service: service_name.to_string(),
        reason: "missing Id property".to_string(),
    })?;

    let mut status = ServiceStatus::new(id);
    status.active_state = active_state;
    status.sub_state = sub_state;
    status.timestamp_started = started;
    Ok(status)
}

/// Reduces `Mon 2024-01-15 10:30:00 UTC` to `2024-01-15 10:30:00`.
///
/// Values that do not have exactly four tokens are kept as reported.
pub fn repair_start_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("n/a") {
        return None;
    }

    let tokens: Vec<&str> = raw.split_whitespace().collect();
    match tokens.as_slice() {
        [_, date, time, _] => Some(format!("{date} {time}")),
        _ => Some(raw.to_string()),
    }
}

/// Name of the effective user, falling back to `$USER` and then the numeric uid.
pub fn current_account() -> String {
    let uid = geteuid();
    match User::from_uid(uid) {
        Ok(Some(user)) => user.name,
        _ => env::var("USER").unwrap_or_else(|_| uid.to_string()),
    }
}
