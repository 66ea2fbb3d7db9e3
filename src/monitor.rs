//! The poll loop: probe every configured service, reconcile, persist, sleep.
use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::{
    config::{MonitorSettings, ProbeFailurePolicy, ServiceEntry},
    diagnostics::{Diagnostics, Event},
    error::{MonitorError, StoreError},
    logs::{LogCollector, LogRecord},
    probe::ServiceProber,
    reconcile::reconcile,
    shutdown,
    status::{ServiceStatus, format_timestamp, normalize_service_id, service_name_from_id},
    store::{StatusStore, save_log_records},
};

/// Granularity at which the inter-cycle sleep observes cancellation.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// The most recent snapshot known to the monitor, handed to the shutdown path.
///
/// Also remembers which unit id each configured name resolved to, since the manager may
/// answer an alias (`sshd`) with a different id (`ssh.service`).
#[derive(Debug, Clone, Default)]
pub struct MonitorContext {
    snapshot: Vec<ServiceStatus>,
    resolved_ids: HashMap<String, String>,
}

impl MonitorContext {
    /// Starts from a snapshot loaded before the first cycle.
    pub fn new(snapshot: Vec<ServiceStatus>) -> Self {
        Self {
            snapshot,
            resolved_ids: HashMap::new(),
        }
    }

    /// The last snapshot that was loaded at startup or committed by a cycle.
    pub fn snapshot(&self) -> &[ServiceStatus] {
        &self.snapshot
    }

    /// The unit id `name` last resolved to, falling back to the `.service` form of `name`.
    pub fn resolved_id(&self, name: &str) -> String {
        self.resolved_ids
            .get(name)
            .cloned()
            .unwrap_or_else(|| normalize_service_id(name))
    }

    fn commit(&mut self, snapshot: Vec<ServiceStatus>) {
        self.snapshot = snapshot;
    }

    fn remember(&mut self, name: &str, service_id: &str) {
        self.resolved_ids
            .insert(name.to_string(), service_id.to_string());
    }
}

/// Records keyed by `service_id`, in first-seen order.
#[derive(Debug, Default)]
struct StatusIndex {
    records: Vec<ServiceStatus>,
    positions: HashMap<String, usize>,
}

impl StatusIndex {
    /// Inserts `record`, replacing any earlier record with the same id.
    fn upsert(&mut self, record: ServiceStatus) {
        match self.positions.get(&record.service_id) {
            Some(&idx) => self.records[idx] = record,
            None => {
                self.positions
                    .insert(record.service_id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Inserts `record` only if no record with the same id is present.
    fn insert_if_absent(&mut self, record: ServiceStatus) {
        if !self.positions.contains_key(&record.service_id) {
            self.upsert(record);
        }
    }

    fn into_records(self) -> Vec<ServiceStatus> {
        self.records
    }
}

/// What one completed cycle produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Ids of the services in the committed snapshot.
    pub checked: Vec<String>,
    /// The committed snapshot.
    pub snapshot: Vec<ServiceStatus>,
    /// Log artifacts written this cycle.
    pub log_artifacts: Vec<PathBuf>,
    /// When the next cycle is due.
    pub next_check: String,
}

/// How a cycle ended without error.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Every service was visited and the snapshot committed.
    Completed(CycleReport),
    /// Cancellation was observed mid-cycle; nothing was written.
    Cancelled,
}

/// Drives poll cycles for one set of configured services.
pub struct Monitor<P: ServiceProber> {
    settings: MonitorSettings,
    services: Vec<ServiceEntry>,
    prober: P,
    store: StatusStore,
    diagnostics: Diagnostics,
    context: MonitorContext,
}

impl<P: ServiceProber> Monitor<P> {
    /// Creates a monitor and loads the existing snapshot into its context.
    pub fn new(
        settings: MonitorSettings,
        services: Vec<ServiceEntry>,
        prober: P,
        diagnostics: Diagnostics,
    ) -> Self {
        let store = StatusStore::new(settings.layout.status_path());
        let context = MonitorContext::new(store.load());
        Self {
            settings,
            services,
            prober,
            store,
            diagnostics,
            context,
        }
    }

    pub fn context(&self) -> &MonitorContext {
        &self.context
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Runs one poll cycle over every configured service.
    ///
    /// The persisted snapshot is re-read first, so external edits between cycles are honoured.
    /// Cancellation is checked before each service; a cancelled cycle writes nothing.
    pub fn run_cycle(&mut self, cancel: &AtomicBool) -> Result<CycleOutcome, MonitorError> {
        let previous = self.store.load();
        let mut previous_by_id: HashMap<&str, &ServiceStatus> = HashMap::new();
        for record in &previous {
            previous_by_id
                .entry(record.service_id.as_str())
                .or_insert(record);
        }

        let collector = LogCollector::new(&self.diagnostics, self.settings.log_lines);
        let mut index = StatusIndex::default();
        let mut buffered_logs: Vec<(String, Vec<LogRecord>)> = Vec::new();
        let mut collected: HashSet<String> = HashSet::new();

        for entry in &self.services {
            if cancel.load(Ordering::SeqCst) {
                info!("Cancellation requested; abandoning current cycle");
                return Ok(CycleOutcome::Cancelled);
            }

            let name = match entry.name() {
                Ok(name) => name,
                Err(err) => {
                    warn!("Skipping services-list entry: {err}");
                    self.diagnostics.emit(Event::ServiceSkipped {
                        line: entry.line,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            match self.prober.probe(name) {
                Ok(current) => {
                    self.context.remember(name, &current.service_id);
                    let previous = previous_by_id.get(current.service_id.as_str()).copied();
                    debug!(
                        "Probed '{}': {:?}/{:?}",
                        current.service_id, current.active_state, current.sub_state
                    );
                    index.upsert(reconcile(previous, current));
                }
                Err(err) => match self.settings.probe_failure {
                    ProbeFailurePolicy::AbortCycle => {
                        error!("Probe failed for '{name}'; aborting cycle: {err}");
                        return Err(err.into());
                    }
                    ProbeFailurePolicy::Isolate => {
                        warn!("Probe failed for '{name}': {err}");
                        self.diagnostics.emit(Event::ServiceProbeFailed {
                            service_name: name.to_string(),
                            error: err.to_string(),
                        });
                        let service_id = self.context.resolved_id(name);
                        if let Some(previous) = previous_by_id.get(service_id.as_str()) {
                            index.insert_if_absent((*previous).clone());
                        }
                    }
                },
            }

            if let Some(log_path) = &entry.log_path {
                let service_name = service_name_from_id(name).to_string();
                if collected.insert(service_name.clone()) {
                    let records = collector.collect(&service_name, log_path);
                    buffered_logs.push((service_name, records));
                }
            }
        }

        let snapshot = index.into_records();
        self.store.save(&snapshot)?;
        self.context.commit(snapshot.clone());

        let mut log_artifacts = Vec::with_capacity(buffered_logs.len());
        for (service_name, records) in &buffered_logs {
            match save_log_records(&self.settings.layout, service_name, records) {
                Ok(path) => log_artifacts.push(path),
                Err(err) => error!("Failed to write logs for '{service_name}': {err}"),
            }
        }

        let checked: Vec<String> = snapshot
            .iter()
            .map(|record| record.service_id.clone())
            .collect();
        let next_check = match chrono::Duration::from_std(self.settings.interval) {
            Ok(interval) => format_timestamp(Local::now() + interval),
            Err(_) => format_timestamp(Local::now()),
        };

        info!(
            "Checked {} services; next check at {next_check}",
            checked.len()
        );
        self.diagnostics.emit(Event::ServiceStatusUpdated {
            services: checked.clone(),
            next_check: next_check.clone(),
        });

        Ok(CycleOutcome::Completed(CycleReport {
            checked,
            snapshot,
            log_artifacts,
            next_check,
        }))
    }

    /// Runs cycles until `cancel` is set. Cycle failures are logged and retried after the
    /// usual interval.
    pub fn run(&mut self, cancel: &AtomicBool) {
        loop {
            if cancel.load(Ordering::SeqCst) {
                return;
            }

            match self.run_cycle(cancel) {
                Ok(CycleOutcome::Completed(report)) => {
                    debug!("Cycle committed {} records", report.snapshot.len());
                }
                Ok(CycleOutcome::Cancelled) => return,
                Err(err) => error!("Poll cycle failed: {err}"),
            }

            if sleep_until_cancelled(self.settings.interval, cancel) {
                return;
            }
        }
    }

    /// Marks the monitor's own record inactive and persists the latest snapshot.
    pub fn shutdown(&self) -> Result<(), StoreError> {
        shutdown::shutdown(
            &self.context,
            &self.store,
            &self.settings.self_service_id,
            &self.diagnostics,
        )
    }
}

/// Sleeps for `duration` in short slices. Returns `true` if cancelled before it elapsed.
pub fn sleep_until_cancelled(duration: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.load(Ordering::SeqCst) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
