//! Rate calculation from cumulative counters
//!
//! CPU percent is derived from the previous CPU counters the runtime embeds
//! in each snapshot. Network and block rates are derived from the previously
//! stored snapshot, counters and timestamp taken together. Each metric thus
//! uses one self-consistent baseline.

use chrono::{DateTime, Utc};

use crate::models::{RawStats, Sample};

/// Seconds between two snapshot times, possibly zero or negative
pub fn elapsed_seconds(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

fn cpu_percent(raw: &RawStats) -> f64 {
    let cpu_delta = raw.cpu_total as f64 - raw.precpu_total as f64;
    let system_delta = raw.system_cpu as f64 - raw.presystem_cpu as f64;
    if cpu_delta <= 0.0 || system_delta <= 0.0 {
        return 0.0;
    }

    let cpus = match raw.online_cpus {
        Some(n) if n > 0 => n as f64,
        _ if raw.percpu_count > 0 => raw.percpu_count as f64,
        _ => 1.0,
    };

    cpu_delta / system_delta * cpus * 100.0
}

/// Per-second rate of a cumulative counter. A counter reset yields a
/// negative rate for that one tick.
fn rate(current: u64, previous: u64, elapsed: f64) -> f64 {
    (current as f64 - previous as f64) / elapsed
}

/// Build a sample from the current snapshot and the previous stored one
pub fn derive_sample(current: &RawStats, previous: Option<&RawStats>) -> Sample {
    let mut sample = Sample {
        timestamp: current.taken_at,
        cpu_percent: cpu_percent(current),
        memory_usage: current.memory_usage,
        memory_percent: (current.memory_limit > 0)
            .then(|| current.memory_usage as f64 / current.memory_limit as f64 * 100.0),
        memory_cache: current.memory_cache,
        net_rx_bytes: current.net_rx_bytes,
        net_tx_bytes: current.net_tx_bytes,
        block_read: current.block_read,
        block_write: current.block_write,
        pids_count: current.pids,
        ..Default::default()
    };

    if let Some(prev) = previous {
        let elapsed = elapsed_seconds(prev.taken_at, current.taken_at);
        if elapsed > 0.0 {
            sample.net_rx_rate = rate(current.net_rx_bytes, prev.net_rx_bytes, elapsed);
            sample.net_tx_rate = rate(current.net_tx_bytes, prev.net_tx_bytes, elapsed);
            sample.block_read_rate = rate(current.block_read, prev.block_read, elapsed);
            sample.block_write_rate = rate(current.block_write, prev.block_write, elapsed);
        }
    }

    sample
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn raw(secs: i64) -> RawStats {
        RawStats {
            taken_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cpu_percent_uses_embedded_baseline() {
        let mut current = raw(0);
        current.cpu_total = 2_000;
        current.precpu_total = 1_000;
        current.system_cpu = 20_000;
        current.presystem_cpu = 10_000;
        current.online_cpus = Some(4);

        assert_eq!(derive_sample(&current, None).cpu_percent, 40.0);
    }

    #[test]
    fn test_cpu_count_fallbacks() {
        let mut current = raw(0);
        current.cpu_total = 150;
        current.precpu_total = 100;
        current.system_cpu = 1_100;
        current.presystem_cpu = 100;

        current.online_cpus = None;
        current.percpu_count = 2;
        assert_eq!(cpu_percent(&current), 10.0);

        current.online_cpus = Some(0);
        current.percpu_count = 0;
        assert_eq!(cpu_percent(&current), 5.0);
    }

    #[test]
    fn test_cpu_zero_without_activity() {
        let mut current = raw(0);
        current.cpu_total = 100;
        current.precpu_total = 100;
        current.system_cpu = 500;
        current.presystem_cpu = 100;
        assert_eq!(cpu_percent(&current), 0.0);

        current.cpu_total = 200;
        current.system_cpu = 100;
        assert_eq!(cpu_percent(&current), 0.0);
    }

    #[test]
    fn test_memory_percent_unset_without_limit() {
        let mut current = raw(0);
        current.memory_usage = 256;
        assert_eq!(derive_sample(&current, None).memory_percent, None);

        current.memory_limit = 1024;
        assert_eq!(derive_sample(&current, None).memory_percent, Some(25.0));
    }

    #[test]
    fn test_first_sample_has_zero_rates() {
        let mut current = raw(0);
        current.net_rx_bytes = 5_000;
        current.block_write = 9_000;

        let sample = derive_sample(&current, None);
        assert_eq!(sample.net_rx_rate, 0.0);
        assert_eq!(sample.block_write_rate, 0.0);
        assert_eq!(sample.net_rx_bytes, 5_000);
    }

    #[test]
    fn test_rates_against_previous_snapshot() {
        let mut previous = raw(0);
        previous.net_rx_bytes = 1_000;
        previous.net_tx_bytes = 2_000;
        previous.block_read = 0;

        let mut current = raw(5);
        current.net_rx_bytes = 6_000;
        current.net_tx_bytes = 2_500;
        current.block_read = 50_000;

        let sample = derive_sample(&current, Some(&previous));
        assert_eq!(sample.net_rx_rate, 1_000.0);
        assert_eq!(sample.net_tx_rate, 100.0);
        assert_eq!(sample.block_read_rate, 10_000.0);
    }

    #[test]
    fn test_non_positive_elapsed_gives_zero_rates() {
        let mut previous = raw(10);
        previous.net_rx_bytes = 0;
        let mut current = raw(10);
        current.net_rx_bytes = 1_000;

        assert_eq!(derive_sample(&current, Some(&previous)).net_rx_rate, 0.0);

        current.taken_at = previous.taken_at - Duration::seconds(1);
        assert_eq!(derive_sample(&current, Some(&previous)).net_rx_rate, 0.0);
    }

    #[test]
    fn test_counter_reset_yields_negative_rate() {
        let mut previous = raw(0);
        previous.net_tx_bytes = 10_000;
        let mut current = raw(10);
        current.net_tx_bytes = 0;

        let sample = derive_sample(&current, Some(&previous));
        assert_eq!(sample.net_tx_rate, -1_000.0);
    }
}
