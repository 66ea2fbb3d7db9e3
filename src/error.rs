//! Error handling for svcwatch.
use std::path::PathBuf;

use thiserror::Error;

/// Top-level errors surfaced to the binary.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Error loading configuration or the services list.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error probing a service (only fatal under the abort-cycle policy).
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Error persisting the status snapshot or log artifacts.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Error installing the cancellation handler.
    #[error("Failed to install signal handler: {0}")]
    SignalHandler(#[from] ctrlc::Error),
}

/// Errors raised while reading configuration and service entries.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading a configuration or services-list file.
    #[error("Failed to read {path}: {source}")]
    ReadError {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A `${VAR}` reference in the config file has no value in the environment.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A user-facing value could not be interpreted.
    #[error("Invalid value for {field}: '{value}'")]
    InvalidValue {
        /// The setting that was rejected.
        field: &'static str,
        /// The offending raw value.
        value: String,
    },

    /// A services-list row has no usable service name.
    #[error("Line {line}: no usable service name in '{raw}'")]
    MissingServiceName {
        /// One-based line number in the services list.
        line: usize,
        /// The raw row as read.
        raw: String,
    },

    /// The services file was not specified on the command line or in the config file.
    #[error("No services list configured (use --services or `services_file`)")]
    NoServicesFile,
}

/// Errors raised while querying the service manager.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe command could not be spawned.
    #[error("Failed to run '{command}' for service '{service}': {source}")]
    SpawnError {
        /// The service being probed.
        service: String,
        /// The command that failed to start.
        command: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The probe command exited with a non-zero status.
    #[error("Probe for service '{service}' exited with status {code:?}: {stderr}")]
    CommandFailed {
        /// The service being probed.
        service: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Trimmed standard error of the probe.
        stderr: String,
    },

    /// The probe output could not be interpreted.
    #[error("Unparseable probe output for service '{service}': {reason}")]
    Unparseable {
        /// The service being probed.
        service: String,
        /// What was wrong with the output.
        reason: String,
    },

    /// The service manager does not know the service.
    #[error("Service '{0}' is not known to the service manager")]
    UnknownService(String),
}

/// Error type for log file access.
#[derive(Debug, Error)]
pub enum LogAccessError {
    /// Error opening or reading the log file.
    #[error("Failed to read log file {path}: {source}")]
    ReadError {
        /// The log file being tailed.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },
}

/// A single log line that could not be parsed.
#[derive(Debug, Error)]
#[error("Failed to parse log line: {0}")]
pub struct LogParseError(#[from] pub serde_json::Error);

/// Error type for status store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error creating directories or writing files.
    #[error("Failed to write {path}: {source}")]
    WriteError {
        /// The artifact being written.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error serializing the snapshot.
    #[error("Failed to serialize {path}: {source}")]
    SerializeError {
        /// The artifact being written.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: serde_json::Error,
    },
}
