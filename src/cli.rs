//! Command-line interface for svcwatch.
use std::str::FromStr;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::config::{FileConfig, ProbeFailurePolicy};

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let lowercase = trimmed.to_ascii_lowercase();
        let level = match lowercase.as_str() {
            "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" | "information" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

/// Command-line interface for svcwatch.
#[derive(Parser, Debug)]
#[command(name = "svcwatch", version, author)]
#[command(
    about = "Polls systemd services and publishes their status as JSON",
    long_about = None
)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevelArg>,

    /// Optional YAML configuration file; flags given here take precedence.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Services list: one name per line, or CSV with `service_name` and `log_path` columns.
    #[arg(short, long, value_name = "FILE")]
    pub services: Option<String>,

    /// Directory for the status snapshot and the `logs/` folder (defaults to `.`).
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<String>,

    /// Prefix for every output file name.
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Pause between poll cycles (e.g., "30", "30s", "5m").
    #[arg(short, long, value_name = "DURATION")]
    pub interval: Option<String>,

    /// Unit id of this monitor, marked inactive on shutdown (defaults to `svcwatch.service`).
    #[arg(long, value_name = "UNIT")]
    pub self_service: Option<String>,

    /// Query the user's service manager (`systemctl --user`).
    #[arg(long)]
    pub user: bool,

    /// Path to the `systemctl` binary.
    #[arg(long, value_name = "PATH")]
    pub systemctl: Option<String>,

    /// Number of trailing log lines published per service (default: 100).
    #[arg(long, value_name = "N")]
    pub log_lines: Option<usize>,

    /// What to do when a single probe fails: `isolate` or `abort-cycle`.
    #[arg(long, value_name = "POLICY")]
    pub probe_failure: Option<ProbeFailurePolicy>,

    /// Run a single poll cycle and exit.
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    /// Settings given on the command line, in the same shape as the config file.
    pub fn overrides(&self) -> FileConfig {
        FileConfig {
            services_file: self.services.clone(),
            output_dir: self.output_dir.clone(),
            prefix: self.prefix.clone(),
            interval: self.interval.clone(),
            self_service: self.self_service.clone(),
            user: self.user.then_some(true),
            systemctl: self.systemctl.clone(),
            log_lines: self.log_lines,
            probe_failure: self.probe_failure,
        }
    }
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
