//! Session aggregation
//!
//! Turns an ordered run of samples into per-metric min/max/avg/p95/p99,
//! reset-aware cumulative totals and a network traffic breakdown.
//! Everything here is a pure function of its input.

use crate::models::{ContainerSummary, NetworkBreakdown, Sample, Summary, TrafficSplit};

/// Scalar metrics tracked per sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    CpuPercent,
    MemoryUsage,
    MemoryPercent,
    NetRxRate,
    NetTxRate,
    BlockReadRate,
    BlockWriteRate,
    PidsCount,
}

/// Accessor table, indexed by `MetricKind as usize`
const METRIC_ACCESSORS: [fn(&Sample) -> f64; 8] = [
    cpu_percent,
    memory_usage,
    memory_percent,
    net_rx_rate,
    net_tx_rate,
    block_read_rate,
    block_write_rate,
    pids_count,
];

fn cpu_percent(s: &Sample) -> f64 {
    s.cpu_percent
}

fn memory_usage(s: &Sample) -> f64 {
    s.memory_usage as f64
}

fn memory_percent(s: &Sample) -> f64 {
    s.memory_percent.unwrap_or(0.0)
}

fn net_rx_rate(s: &Sample) -> f64 {
    s.net_rx_rate
}

fn net_tx_rate(s: &Sample) -> f64 {
    s.net_tx_rate
}

fn block_read_rate(s: &Sample) -> f64 {
    s.block_read_rate
}

fn block_write_rate(s: &Sample) -> f64 {
    s.block_write_rate
}

fn pids_count(s: &Sample) -> f64 {
    s.pids_count as f64
}

impl MetricKind {
    pub const ALL: [MetricKind; 8] = [
        MetricKind::CpuPercent,
        MetricKind::MemoryUsage,
        MetricKind::MemoryPercent,
        MetricKind::NetRxRate,
        MetricKind::NetTxRate,
        MetricKind::BlockReadRate,
        MetricKind::BlockWriteRate,
        MetricKind::PidsCount,
    ];

    /// Read this metric from a sample
    pub fn value(self, sample: &Sample) -> f64 {
        METRIC_ACCESSORS[self as usize](sample)
    }

    /// Human readable name used in reports
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::CpuPercent => "CPU %",
            MetricKind::MemoryUsage => "Memory",
            MetricKind::MemoryPercent => "Memory %",
            MetricKind::NetRxRate => "Net RX/s",
            MetricKind::NetTxRate => "Net TX/s",
            MetricKind::BlockReadRate => "Block read/s",
            MetricKind::BlockWriteRate => "Block write/s",
            MetricKind::PidsCount => "PIDs",
        }
    }

    /// The cumulative counter backing this rate metric, if any
    pub fn counter(self) -> Option<CounterKind> {
        match self {
            MetricKind::NetRxRate => Some(CounterKind::NetRx),
            MetricKind::NetTxRate => Some(CounterKind::NetTx),
            MetricKind::BlockReadRate => Some(CounterKind::BlockRead),
            MetricKind::BlockWriteRate => Some(CounterKind::BlockWrite),
            _ => None,
        }
    }

    /// Borrow this metric's aggregate from a container summary
    pub fn of(self, summary: &ContainerSummary) -> &Summary {
        match self {
            MetricKind::CpuPercent => &summary.cpu_percent,
            MetricKind::MemoryUsage => &summary.memory_usage,
            MetricKind::MemoryPercent => &summary.memory_percent,
            MetricKind::NetRxRate => &summary.net_rx_rate,
            MetricKind::NetTxRate => &summary.net_tx_rate,
            MetricKind::BlockReadRate => &summary.block_read_rate,
            MetricKind::BlockWriteRate => &summary.block_write_rate,
            MetricKind::PidsCount => &summary.pids_count,
        }
    }

    fn of_mut(self, summary: &mut ContainerSummary) -> &mut Summary {
        match self {
            MetricKind::CpuPercent => &mut summary.cpu_percent,
            MetricKind::MemoryUsage => &mut summary.memory_usage,
            MetricKind::MemoryPercent => &mut summary.memory_percent,
            MetricKind::NetRxRate => &mut summary.net_rx_rate,
            MetricKind::NetTxRate => &mut summary.net_tx_rate,
            MetricKind::BlockReadRate => &mut summary.block_read_rate,
            MetricKind::BlockWriteRate => &mut summary.block_write_rate,
            MetricKind::PidsCount => &mut summary.pids_count,
        }
    }
}

/// Cumulative counters carried on every sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    NetRx,
    NetTx,
    BlockRead,
    BlockWrite,
}

impl CounterKind {
    pub fn value(self, sample: &Sample) -> u64 {
        match self {
            CounterKind::NetRx => sample.net_rx_bytes,
            CounterKind::NetTx => sample.net_tx_bytes,
            CounterKind::BlockRead => sample.block_read,
            CounterKind::BlockWrite => sample.block_write,
        }
    }

    /// Bytes accumulated between the first and last sample.
    ///
    /// A last value below the first means the counter was reset (container
    /// restart); accumulation is then treated as restarting from zero.
    pub fn total(self, samples: &[Sample]) -> u64 {
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return 0;
        };
        let (first, last) = (self.value(first), self.value(last));
        if last >= first {
            last - first
        } else {
            last
        }
    }
}

/// Aggregate a run of samples. Returns `None` when there is no data.
pub fn aggregate(samples: &[Sample]) -> Option<ContainerSummary> {
    let (first, last) = (samples.first()?, samples.last()?);

    let mut summary = ContainerSummary {
        sample_count: samples.len(),
        ..Default::default()
    };

    for kind in MetricKind::ALL {
        let values: Vec<f64> = samples.iter().map(|s| kind.value(s)).collect();
        let mut stats = summarize(&values);
        if let Some(counter) = kind.counter() {
            stats.total = Some(counter.total(samples) as f64);
        }
        *kind.of_mut(&mut summary) = stats;
    }

    summary.net_rx_total = CounterKind::NetRx.total(samples);
    summary.net_tx_total = CounterKind::NetTx.total(samples);
    summary.block_read_total = CounterKind::BlockRead.total(samples);
    summary.block_write_total = CounterKind::BlockWrite.total(samples);
    summary.network_breakdown = network_breakdown(samples);
    summary.duration = format_duration(last.timestamp - first.timestamp);

    Some(summary)
}

/// min, max, avg, p95, p99 of a set of values
pub fn summarize(values: &[f64]) -> Summary {
    if values.is_empty() {
        return Summary::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let sum: f64 = values.iter().sum();

    Summary {
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        avg: sum / values.len() as f64,
        p95: percentile(&sorted, 0.95),
        p99: percentile(&sorted, 0.99),
        total: None,
    }
}

/// Linear-interpolated percentile of an ascending slice, `p` in `[0, 1]`
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => return 0.0,
        1 => return sorted[0],
        _ => {}
    }

    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        return sorted[lower];
    }

    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Traffic distribution over the samples.
///
/// Byte-level classification wins whenever any sample carries it;
/// connection counts are only used when no sample has byte data.
pub fn network_breakdown(samples: &[Sample]) -> Option<NetworkBreakdown> {
    let mut bytes = TrafficSplit::<u64>::default();
    let mut conns = TrafficSplit::<u64>::default();

    for sample in samples {
        if let Some(b) = sample.classified_bytes.filter(|b| b.total() > 0) {
            bytes.merge(&b);
        }
        if let Some(c) = sample.connections.filter(|c| c.total() > 0) {
            conns.merge(&c);
        }
    }

    if bytes.total() > 0 {
        Some(percentages(&bytes))
    } else if conns.total() > 0 {
        Some(percentages(&conns))
    } else {
        None
    }
}

fn percentages(split: &TrafficSplit<u64>) -> NetworkBreakdown {
    let total = split.total() as f64;
    NetworkBreakdown {
        inter_container_pct: split.inter_container as f64 / total * 100.0,
        internal_pct: split.internal as f64 / total * 100.0,
        internet_pct: split.internet as f64 / total * 100.0,
    }
}

/// Format a duration rounded to seconds, e.g. `1h2m3s`, `4m0s`, `12s`
pub fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_milliseconds().max(0).saturating_add(500) / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    if h > 0 {
        format!("{}h{}m{}s", h, m, s)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}
