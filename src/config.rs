//! Configuration management for svcwatch.
use regex::Regex;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::debug;

use crate::{
    error::ConfigError,
    logs::DEFAULT_LOG_LINES,
    status::normalize_service_id,
    store::OutputLayout,
};

/// Pause between two poll cycles unless configured otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Unit id the monitor itself runs as.
pub const DEFAULT_SELF_SERVICE: &str = "svcwatch.service";

/// Service manager client used for probes.
pub const DEFAULT_SYSTEMCTL: &str = "systemctl";

const CSV_NAME_COLUMN: &str = "service_name";
const CSV_LOG_COLUMN: &str = "log_path";

/// What a poll cycle does when one service cannot be probed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProbeFailurePolicy {
    /// Report the failure, keep the service's previous record and carry on.
    #[default]
    Isolate,
    /// Abandon the whole cycle without writing anything.
    AbortCycle,
}

/// Settings as they appear in the YAML file. Every field is optional; CLI flags use the same
/// shape so the two sources can be layered.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Services list (plain names or CSV).
    pub services_file: Option<String>,
    /// Directory receiving the status snapshot and the `logs/` artifacts.
    pub output_dir: Option<String>,
    /// Namespace prepended to every output file name.
    pub prefix: Option<String>,
    /// Pause between cycles (`30`, `30s`, `5m`, `1h`).
    pub interval: Option<String>,
    /// Unit id forced to inactive on shutdown.
    pub self_service: Option<String>,
    /// Query the user's service manager instead of the system one.
    pub user: Option<bool>,
    /// Path to the `systemctl` binary.
    pub systemctl: Option<String>,
    /// Trailing lines read from each log file.
    pub log_lines: Option<usize>,
    /// Behaviour when a probe fails.
    pub probe_failure: Option<ProbeFailurePolicy>,
}

impl FileConfig {
    /// Fills every unset field of `self` from `fallback`.
    pub fn or(self, fallback: FileConfig) -> FileConfig {
        FileConfig {
            services_file: self.services_file.or(fallback.services_file),
            output_dir: self.output_dir.or(fallback.output_dir),
            prefix: self.prefix.or(fallback.prefix),
            interval: self.interval.or(fallback.interval),
            self_service: self.self_service.or(fallback.self_service),
            user: self.user.or(fallback.user),
            systemctl: self.systemctl.or(fallback.systemctl),
            log_lines: self.log_lines.or(fallback.log_lines),
            probe_failure: self.probe_failure.or(fallback.probe_failure),
        }
    }
}

/// Fully resolved settings of one monitor instance.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub services_file: PathBuf,
    pub layout: OutputLayout,
    pub interval: Duration,
    pub self_service_id: String,
    pub user_mode: bool,
    pub systemctl: PathBuf,
    pub log_lines: usize,
    pub probe_failure: ProbeFailurePolicy,
}

impl TryFrom<FileConfig> for MonitorSettings {
    type Error = ConfigError;

    fn try_from(config: FileConfig) -> Result<Self, Self::Error> {
        let services_file = config
            .services_file
            .map(PathBuf::from)
            .ok_or(ConfigError::NoServicesFile)?;
        let interval = match config.interval.as_deref() {
            Some(raw) => parse_duration(raw).map_err(|_| ConfigError::InvalidValue {
                field: "interval",
                value: raw.to_string(),
            })?,
            None => DEFAULT_INTERVAL,
        };
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "interval",
                value: config.interval.unwrap_or_default(),
            });
        }

        Ok(Self {
            services_file,
            layout: OutputLayout::new(
                config.output_dir.unwrap_or_else(|| ".".to_string()),
                config.prefix,
            ),
            interval,
            self_service_id: normalize_service_id(
                config.self_service.as_deref().unwrap_or(DEFAULT_SELF_SERVICE),
            ),
            user_mode: config.user.unwrap_or(false),
            systemctl: PathBuf::from(
                config.systemctl.unwrap_or_else(|| DEFAULT_SYSTEMCTL.to_string()),
            ),
            log_lines: config.log_lines.unwrap_or(DEFAULT_LOG_LINES),
            probe_failure: config.probe_failure.unwrap_or_default(),
        })
    }
}

/// Expands `$VAR` and `${VAR}` references from the environment.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?")
        .expect("environment variable pattern is valid");

    if let Some(missing) = re
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .find(|name| env::var(name).is_err())
    {
        return Err(ConfigError::MissingEnvVar(missing));
    }

    let result = re.replace_all(input, |caps: &regex::Captures| {
        env::var(&caps[1]).unwrap_or_default()
    });
    Ok(result.to_string())
}

/// Loads and parses the YAML configuration file, expanding environment variables.
pub fn load_config(config_path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(config_path).map_err(|source| ConfigError::ReadError {
        path: config_path.to_path_buf(),
        source,
    })?;

    let expanded = expand_env_vars(&content)?;
    if expanded.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    Ok(serde_yaml::from_str(&expanded)?)
}

/// Parses a user-facing duration string in the format `<number>[s|m|h]`.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        field: "duration",
        value: raw.to_string(),
    };

    let value = raw.trim();
    if value.is_empty() {
        return Err(invalid());
    }

    let (amount_str, multiplier) = if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3600)
    } else {
        (value, 1)
    };

    let amount: u64 = amount_str.parse().map_err(|_| invalid())?;
    Ok(Duration::from_secs(amount.saturating_mul(multiplier)))
}

/// One row of the services list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    /// One-based line number in the services file.
    pub line: usize,
    /// The row as read, for diagnostics.
    pub raw: String,
    /// Usable service name, if the row had one.
    pub service_name: Option<String>,
    /// Absolute path of an existing log file, if one was configured.
    pub log_path: Option<PathBuf>,
}

impl ServiceEntry {
    /// The service name, or why the row cannot be monitored.
    pub fn name(&self) -> Result<&str, ConfigError> {
        self.service_name
            .as_deref()
            .ok_or_else(|| ConfigError::MissingServiceName {
                line: self.line,
                raw: self.raw.clone(),
            })
    }
}

/// Reads the services list at `path`.
pub fn load_services(path: &Path) -> Result<Vec<ServiceEntry>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_services(&content))
}

/// Parses a services list: either one name per line, or CSV whose header names a
/// `service_name` column and optionally a `log_path` column.
///
/// Blank lines and `#` comments are ignored. Rows without a usable name are kept with
/// `service_name: None` so the poll cycle can report them.
pub fn parse_services(content: &str) -> Vec<ServiceEntry> {
    let mut rows = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .peekable();

    let header = rows
        .peek()
        .map(|(_, line)| split_csv_row(line))
        .filter(|fields| fields.iter().any(|field| field == CSV_NAME_COLUMN));

    let Some(header) = header else {
        return rows
            .map(|(line, raw)| ServiceEntry {
                line,
                raw: raw.to_string(),
                service_name: usable_name(raw),
                log_path: None,
            })
            .collect();
    };
    rows.next();

    let name_idx = header
        .iter()
        .position(|field| field == CSV_NAME_COLUMN)
        .unwrap_or(0);
    let log_idx = header.iter().position(|field| field == CSV_LOG_COLUMN);

    rows.map(|(line, raw)| {
        let fields = split_csv_row(raw);
        let service_name = fields.get(name_idx).and_then(|name| usable_name(name));
        let log_path = log_idx
            .and_then(|idx| fields.get(idx))
            .and_then(|path| resolve_log_path(path));
        ServiceEntry {
            line,
            raw: raw.to_string(),
            service_name,
            log_path,
        }
    })
    .collect()
}

/// Splits one CSV row. Double-quoted fields may contain commas; `""` inside quotes is a
/// literal quote.
fn split_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field).trim().to_string()),
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

fn usable_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    let valid = !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '/');
    valid.then(|| name.to_string())
}

/// Resolves a configured log path to an absolute path, or `None` when blank or missing.
fn resolve_log_path(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match fs::canonicalize(raw) {
        Ok(path) => Some(path),
        Err(err) => {
            debug!("Ignoring log path '{raw}': {err}");
            None
        }
    }
}
