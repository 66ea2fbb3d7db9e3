//! Durable output: the status snapshot and per-service log artifacts.
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{error::StoreError, logs::LogRecord, status::ServiceStatus};

const STATUS_FILE_NAME: &str = "services_status.json";
const LOGS_DIR_NAME: &str = "logs";

/// Where a monitor instance writes its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    output_dir: PathBuf,
    prefix: Option<String>,
}

impl OutputLayout {
    /// Artifacts live under `output_dir`; a non-empty `prefix` namespaces every file name.
    pub fn new(output_dir: impl Into<PathBuf>, prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|prefix| prefix.trim().to_string())
            .filter(|prefix| !prefix.is_empty());
        Self {
            output_dir: output_dir.into(),
            prefix,
        }
    }

    fn file_name(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}_{name}"),
            None => name.to_string(),
        }
    }

    /// Path of the status snapshot.
    pub fn status_path(&self) -> PathBuf {
        self.output_dir.join(self.file_name(STATUS_FILE_NAME))
    }

    /// Directory holding per-service log artifacts.
    pub fn logs_dir(&self) -> PathBuf {
        self.output_dir.join(LOGS_DIR_NAME)
    }

    /// Path of the log artifact for `service_name`.
    pub fn log_path(&self, service_name: &str) -> PathBuf {
        let safe_name = service_name.replace(['/', '\\'], "_");
        self.logs_dir()
            .join(self.file_name(&format!("{safe_name}.json")))
    }
}

/// Writes `value` as pretty JSON so that readers see either the old file or the new one.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_error = |source| StoreError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_error)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(write_error)?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|source| {
        StoreError::SerializeError {
            path: path.to_path_buf(),
            source,
        }
    })?;
    tmp.write_all(b"\n").map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(write_error)?;
    }
    tmp.persist(path).map_err(|err| write_error(err.error))?;
    Ok(())
}

/// The persisted array of service status records.
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    /// Creates a store backed by the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot from disk.
    ///
    /// A missing, unreadable or corrupt file yields an empty snapshot.
    pub fn load(&self) -> Vec<ServiceStatus> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No status snapshot at {:?} yet", self.path);
                return Vec::new();
            }
            Err(err) => {
                warn!("Failed to read status snapshot {:?}: {err}", self.path);
                return Vec::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    "Ignoring unparseable status snapshot {:?}: {err}",
                    self.path
                );
                Vec::new()
            }
        }
    }

    /// Replaces the snapshot on disk.
    pub fn save(&self, snapshot: &[ServiceStatus]) -> Result<(), StoreError> {
        write_json_atomic(&self.path, snapshot)?;
        debug!("Wrote {} records to {:?}", snapshot.len(), self.path);
        Ok(())
    }
}

/// Writes the parsed log tail of one service.
pub fn save_log_records(
    layout: &OutputLayout,
    service_name: &str,
    records: &[LogRecord],
) -> Result<PathBuf, StoreError> {
    let path = layout.log_path(service_name);
    write_json_atomic(&path, records)?;
    Ok(path)
}
