//! svcwatch is a small agent that periodically probes a fixed set of systemd services,
//! reconciles each reading with the previously published snapshot, and writes the merged
//! result as a JSON status file. Services that declare a log file also get the parsed tail
//! of that file published next to the snapshot.

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Typed diagnostic events on stdout.
pub mod diagnostics;

/// Error handling.
pub mod error;

/// Log tailing and parsing.
pub mod logs;

/// Poll cycle controller.
pub mod monitor;

/// Service manager probes.
pub mod probe;

/// Merging fresh probes with history.
pub mod reconcile;

/// Shutdown handling.
pub mod shutdown;

/// Status record model.
pub mod status;

/// Durable output files.
pub mod store;

#[cfg(test)]
mod test_utils;
