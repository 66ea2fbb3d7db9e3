//! Tails service log files and parses their structured lines.
use std::{
    collections::VecDeque,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::debug;

use crate::{
    diagnostics::{Diagnostics, Event},
    error::{LogAccessError, LogParseError},
};

/// Number of trailing lines read from each log file unless configured otherwise.
pub const DEFAULT_LOG_LINES: usize = 100;

/// Field-name encodings a known upstream formatter gets wrong, and their fixes.
const LINE_REPAIRS: [(&str, &str); 2] = [
    (r#""module","#, r#""module":"#),
    (r#""line_num","#, r#""line_num":"#),
];

/// One successfully parsed log line.
pub type LogRecord = Value;

/// Reads the last `lines` lines of `path`, in file order.
///
/// Invalid UTF-8 is replaced rather than treated as an error.
pub fn tail_lines(path: &Path, lines: usize) -> Result<Vec<String>, LogAccessError> {
    let read_error = |source| LogAccessError::ReadError {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(read_error)?;
    let mut reader = BufReader::new(file);
    let mut tail = VecDeque::with_capacity(lines.min(1024));
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer).map_err(read_error)? == 0 {
            break;
        }
        if lines == 0 {
            continue;
        }
        if tail.len() == lines {
            tail.pop_front();
        }
        let line = String::from_utf8_lossy(&buffer);
        tail.push_back(line.trim_end_matches(['\n', '\r']).to_string());
    }

    Ok(tail.into())
}

/// Applies the known field-name repairs to a raw line.
pub fn repair_line(line: &str) -> String {
    LINE_REPAIRS
        .iter()
        .fold(line.to_string(), |acc, (broken, fixed)| acc.replace(broken, fixed))
}

/// Repairs and parses one log line.
pub fn parse_line(line: &str) -> Result<LogRecord, LogParseError> {
    Ok(serde_json::from_str(&repair_line(line))?)
}

/// Tails and parses service log files, reporting problems as diagnostics.
pub struct LogCollector<'a> {
    diagnostics: &'a Diagnostics,
    max_lines: usize,
}

impl<'a> LogCollector<'a> {
    /// Creates a collector that keeps at most `max_lines` trailing lines per file.
    pub fn new(diagnostics: &'a Diagnostics, max_lines: usize) -> Self {
        Self {
            diagnostics,
            max_lines,
        }
    }

    /// Collects the parsed tail of `log_path` for `service_name`.
    ///
    /// Unreadable files yield no records; malformed lines are dropped individually.
    pub fn collect(&self, service_name: &str, log_path: &Path) -> Vec<LogRecord> {
        self.diagnostics.emit(Event::LogCollectionStarted {
            service_name: service_name.to_string(),
            log_path: PathBuf::from(log_path),
        });

        let lines = match tail_lines(log_path, self.max_lines) {
            Ok(lines) => lines,
            Err(err) => {
                self.diagnostics.emit(Event::FailedToCollectLogs {
                    service_name: service_name.to_string(),
                    error: err.to_string(),
                });
                return Vec::new();
            }
        };

        let mut records = Vec::with_capacity(lines.len());
        for line in lines.iter().filter(|line| !line.trim().is_empty()) {
            match parse_line(line) {
                Ok(record) => records.push(record),
                Err(err) => self.diagnostics.emit(Event::LogLineParsingFailed {
                    service_name: service_name.to_string(),
                    error: err.to_string(),
                    line: line.clone(),
                }),
            }
        }

        debug!(
            "Collected {} of {} log lines for '{service_name}'",
            records.len(),
            lines.len()
        );
        records
    }
}
