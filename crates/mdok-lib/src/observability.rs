//! Structured event logging for monitoring runs
//!
//! Every record carries an `event` field and the run name so that JSON logs
//! from the agent can be filtered per run.

use tracing::{debug, info, warn};

use crate::models::Sample;

/// Structured logger for monitor lifecycle events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    run: String,
}

impl StructuredLogger {
    pub fn new(run: impl Into<String>) -> Self {
        Self { run: run.into() }
    }

    pub fn run(&self) -> &str {
        &self.run
    }

    /// Log monitor startup
    pub fn log_startup(&self, containers: usize, interval_secs: u64, session_id: &str) {
        info!(
            event = "monitor_started",
            run = %self.run,
            containers = containers,
            interval_secs = interval_secs,
            session_id = %session_id,
            "Monitoring started"
        );
    }

    /// Log one collected sample
    pub fn log_sample(&self, container: &str, sample: &Sample) {
        debug!(
            event = "sample_collected",
            run = %self.run,
            container = %container,
            cpu_percent = sample.cpu_percent,
            memory_bytes = sample.memory_usage,
            memory_percent = ?sample.memory_percent,
            net_rx_rate = sample.net_rx_rate,
            net_tx_rate = sample.net_tx_rate,
            pids = sample.pids_count,
            "Sample collected"
        );
    }

    /// Log a container leaving active collection for the rest of the run
    pub fn log_container_dropped(&self, container: &str, reason: &str) {
        warn!(
            event = "container_dropped",
            run = %self.run,
            container = %container,
            reason = %reason,
            "Container dropped from collection"
        );
    }

    /// Log the final summary written for a container
    pub fn log_summary_saved(&self, container: &str, samples: usize, warnings: usize) {
        info!(
            event = "summary_saved",
            run = %self.run,
            container = %container,
            samples = samples,
            warnings = warnings,
            "Saved summary"
        );
    }

    /// Log a failed write; collection continues in memory
    pub fn log_persist_failure(&self, container: &str, error: &dyn std::fmt::Display) {
        warn!(
            event = "persist_failed",
            run = %self.run,
            container = %container,
            error = %error,
            "Failed to persist series"
        );
    }

    /// Log monitor shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_stopped",
            run = %self.run,
            reason = %reason,
            "Monitoring stopped"
        );
    }
}
