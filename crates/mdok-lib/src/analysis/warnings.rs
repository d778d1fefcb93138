//! Resource risk warnings
//!
//! Rule-based scan of an aggregated summary against the container's
//! declared limits. Rules are evaluated independently; the two memory-limit
//! rules are exclusive (the 80% rule only fires when the OOM rule did not).

use std::fmt;

use crate::models::{ContainerLimits, ContainerSummary};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Fraction of the memory limit treated as OOM risk
const OOM_RATIO: f64 = 0.95;

/// Fraction of the memory limit treated as approaching the limit
const MEMORY_HIGH_RATIO: f64 = 0.80;

/// Memory percent above which an unlimited container is flagged
const UNLIMITED_MEMORY_PCT: f64 = 80.0;

const CPU_P95_PCT: f64 = 90.0;
const CPU_THROTTLE_PCT: f64 = 100.0;
const CPU_QUOTA_RATIO: f64 = 0.90;

/// Egress above this many bytes per session is flagged
const EGRESS_BYTES: u64 = 10 * 1024 * 1024 * 1024;

const PIDS_RATIO: f64 = 0.90;

/// A single detected risk
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Warning {
    OomRisk,
    MemoryNearLimit,
    UnlimitedHighMemory,
    SustainedHighCpu,
    CpuThrottling,
    /// Effective CPU limit in percent derived from quota/period
    CpuNearQuota(f64),
    /// Egress in GiB
    HighEgress(f64),
    PidsNearLimit,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::OomRisk => write!(f, "Memory usage reached 95%+ of limit - OOM risk"),
            Warning::MemoryNearLimit => write!(f, "Memory usage P95 above 80% of limit"),
            Warning::UnlimitedHighMemory => {
                write!(f, "High memory usage with no memory limit set")
            }
            Warning::SustainedHighCpu => write!(f, "CPU usage P95 above 90%"),
            Warning::CpuThrottling => write!(f, "CPU usage reached 100% - possible throttling"),
            Warning::CpuNearQuota(limit) => write!(f, "CPU usage near quota limit ({:.1}%)", limit),
            Warning::HighEgress(gb) => write!(f, "High egress traffic: {:.2} GB", gb),
            Warning::PidsNearLimit => write!(f, "PID count near limit"),
        }
    }
}

/// Evaluate every rule and return the warnings that fired, in rule order
pub fn evaluate(summary: &ContainerSummary, limits: &ContainerLimits) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if limits.memory_limit > 0 {
        let limit = limits.memory_limit as f64;
        if summary.memory_usage.max >= limit * OOM_RATIO {
            warnings.push(Warning::OomRisk);
        } else if summary.memory_usage.p95 >= limit * MEMORY_HIGH_RATIO {
            warnings.push(Warning::MemoryNearLimit);
        }
    } else if summary.memory_percent.p95 > UNLIMITED_MEMORY_PCT {
        warnings.push(Warning::UnlimitedHighMemory);
    }

    if summary.cpu_percent.p95 > CPU_P95_PCT {
        warnings.push(Warning::SustainedHighCpu);
    }
    if summary.cpu_percent.max >= CPU_THROTTLE_PCT {
        warnings.push(Warning::CpuThrottling);
    }

    if limits.cpu_quota > 0 && limits.cpu_period > 0 {
        let cpu_limit = limits.cpu_quota as f64 / limits.cpu_period as f64 * 100.0;
        if summary.cpu_percent.p95 >= cpu_limit * CPU_QUOTA_RATIO {
            warnings.push(Warning::CpuNearQuota(cpu_limit));
        }
    }

    if summary.net_tx_total > EGRESS_BYTES {
        warnings.push(Warning::HighEgress(summary.net_tx_total as f64 / GIB));
    }

    if limits.pids_limit > 0 && summary.pids_count.max >= limits.pids_limit as f64 * PIDS_RATIO {
        warnings.push(Warning::PidsNearLimit);
    }

    warnings
}

/// Rendered warning messages for a summary
pub fn detect(summary: &ContainerSummary, limits: &ContainerLimits) -> Vec<String> {
    evaluate(summary, limits)
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Summary;

    const MIB: f64 = 1024.0 * 1024.0;

    fn summary() -> ContainerSummary {
        ContainerSummary {
            sample_count: 10,
            ..Default::default()
        }
    }

    fn stat(max: f64, p95: f64) -> Summary {
        Summary {
            min: 0.0,
            max,
            avg: p95 / 2.0,
            p95,
            p99: max,
            total: None,
        }
    }

    #[test]
    fn test_oom_risk_excludes_near_limit() {
        let mut s = summary();
        s.memory_usage = stat(500.0 * MIB, 490.0 * MIB);
        let limits = ContainerLimits {
            memory_limit: 512 * 1024 * 1024,
            ..Default::default()
        };

        let warnings = detect(&s, &limits);

        assert!(warnings.contains(&"Memory usage reached 95%+ of limit - OOM risk".to_string()));
        assert!(!warnings.contains(&"Memory usage P95 above 80% of limit".to_string()));
    }

    #[test]
    fn test_memory_near_limit() {
        let mut s = summary();
        s.memory_usage = stat(450.0 * MIB, 420.0 * MIB);
        let limits = ContainerLimits {
            memory_limit: 512 * 1024 * 1024,
            ..Default::default()
        };

        assert_eq!(evaluate(&s, &limits), vec![Warning::MemoryNearLimit]);
    }

    #[test]
    fn test_unlimited_high_memory() {
        let mut s = summary();
        s.memory_percent = stat(90.0, 85.0);

        assert_eq!(
            detect(&s, &ContainerLimits::default()),
            vec!["High memory usage with no memory limit set".to_string()]
        );
    }

    #[test]
    fn test_cpu_rules() {
        let mut s = summary();
        s.cpu_percent = stat(120.0, 95.0);

        let warnings = evaluate(&s, &ContainerLimits::default());
        assert_eq!(
            warnings,
            vec![Warning::SustainedHighCpu, Warning::CpuThrottling]
        );
    }

    #[test]
    fn test_cpu_near_quota_reports_limit() {
        let mut s = summary();
        s.cpu_percent = stat(50.0, 46.0);
        let limits = ContainerLimits {
            cpu_quota: 50_000,
            cpu_period: 100_000,
            ..Default::default()
        };

        assert_eq!(
            detect(&s, &limits),
            vec!["CPU usage near quota limit (50.0%)".to_string()]
        );
    }

    #[test]
    fn test_high_egress() {
        let mut s = summary();
        s.net_tx_total = 12 * 1024 * 1024 * 1024;

        assert_eq!(
            detect(&s, &ContainerLimits::default()),
            vec!["High egress traffic: 12.00 GB".to_string()]
        );
    }

    #[test]
    fn test_egress_at_threshold_is_quiet() {
        let mut s = summary();
        s.net_tx_total = EGRESS_BYTES;
        assert!(detect(&s, &ContainerLimits::default()).is_empty());
    }

    #[test]
    fn test_pids_near_limit() {
        let mut s = summary();
        s.pids_count = stat(90.0, 40.0);
        let limits = ContainerLimits {
            pids_limit: 100,
            ..Default::default()
        };

        assert_eq!(evaluate(&s, &limits), vec![Warning::PidsNearLimit]);
    }

    #[test]
    fn test_detect_is_idempotent() {
        let mut s = summary();
        s.cpu_percent = stat(100.0, 99.0);
        s.memory_usage = stat(900.0 * MIB, 850.0 * MIB);
        s.net_tx_total = 20 * 1024 * 1024 * 1024;
        let limits = ContainerLimits {
            memory_limit: 1024 * 1024 * 1024,
            cpu_quota: 100_000,
            cpu_period: 100_000,
            ..Default::default()
        };

        let first = detect(&s, &limits);
        let second = detect(&s, &limits);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn test_quiet_workload() {
        let mut s = summary();
        s.cpu_percent = stat(12.0, 8.0);
        s.memory_usage = stat(64.0 * MIB, 60.0 * MIB);
        let limits = ContainerLimits {
            memory_limit: 512 * 1024 * 1024,
            pids_limit: 200,
            ..Default::default()
        };

        assert!(detect(&s, &limits).is_empty());
    }
}
