//! Machine-readable diagnostic events, written as one JSON object per line.
use std::{
    io::{self, Write},
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Typed payload of a diagnostic line. The variant name becomes the `event` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A services-list row had no usable service name.
    ServiceSkipped { line: usize, reason: String },
    /// Tailing of a service's log file is about to start.
    LogCollectionStarted {
        service_name: String,
        log_path: PathBuf,
    },
    /// The log file could not be read; the service publishes no log lines this cycle.
    FailedToCollectLogs { service_name: String, error: String },
    /// One log line was dropped. `line` carries the raw text for manual inspection.
    LogLineParsingFailed {
        service_name: String,
        error: String,
        line: String,
    },
    /// The status snapshot was committed.
    ServiceStatusUpdated {
        services: Vec<String>,
        next_check: String,
    },
    /// A probe failed and the previous record was carried forward.
    ServiceProbeFailed { service_name: String, error: String },
    /// The monitor marked itself inactive and is exiting.
    MonitorStopped {
        service_id: String,
        snapshot_path: PathBuf,
    },
}

#[derive(Serialize)]
struct DiagnosticLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a Event,
}

/// Writes diagnostic events to a line-oriented sink (stdout in production).
pub struct Diagnostics {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl Diagnostics {
    /// Diagnostics written to the process's standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Diagnostics written to an arbitrary sink.
    pub fn new<W: Write + Send + 'static>(sink: W) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Emits one event. Failures to write are logged and otherwise ignored.
    pub fn emit(&self, event: Event) {
        debug!(?event, "diagnostic");
        let line = DiagnosticLine {
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
            event: &event,
        };

        let encoded = match serde_json::to_string(&line) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("Failed to encode diagnostic {event:?}: {err}");
                return;
            }
        };

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(sink, "{encoded}").and_then(|_| sink.flush()) {
            warn!("Failed to write diagnostic: {err}");
        }
    }
}

/// In-memory sink used by tests to inspect emitted events.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct MemorySink(std::sync::Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl MemorySink {
    pub(crate) fn diagnostics(&self) -> Diagnostics {
        Diagnostics::new(self.clone())
    }

    pub(crate) fn lines(&self) -> Vec<serde_json::Value> {
        let buffer = self.0.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.lines()
            .into_iter()
            .map(|line| serde_json::from_value(line).unwrap())
            .collect()
    }
}

#[cfg(test)]
impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
