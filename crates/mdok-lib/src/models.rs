//! Core data models for container monitoring

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::ops::AddAssign;

/// Destination class of a network connection or flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficClass {
    InterContainer,
    Internal,
    Internet,
}

/// A quantity split across the three traffic classes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSplit<T> {
    pub inter_container: T,
    pub internal: T,
    pub internet: T,
}

impl<T> TrafficSplit<T>
where
    T: Copy + AddAssign + std::ops::Add<Output = T>,
{
    /// Add `amount` to the bucket for `class`
    pub fn add(&mut self, class: TrafficClass, amount: T) {
        match class {
            TrafficClass::InterContainer => self.inter_container += amount,
            TrafficClass::Internal => self.internal += amount,
            TrafficClass::Internet => self.internet += amount,
        }
    }

    /// Add every bucket of `other` into this split
    pub fn merge(&mut self, other: &Self) {
        self.inter_container += other.inter_container;
        self.internal += other.internal;
        self.internet += other.internet;
    }

    pub fn total(&self) -> T {
        self.inter_container + self.internal + self.internet
    }
}

/// Where classified byte counts came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BytesSource {
    /// Measured from the kernel connection-tracking table
    Conntrack,
    /// Only connection counts were available
    Estimated,
}

/// One metrics snapshot for one container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_usage: u64,
    /// Unset when the container has no memory limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f64>,
    #[serde(default)]
    pub memory_cache: u64,
    pub net_rx_bytes: u64,
    pub net_tx_bytes: u64,
    /// bytes/sec
    pub net_rx_rate: f64,
    /// bytes/sec
    pub net_tx_rate: f64,
    pub block_read: u64,
    pub block_write: u64,
    pub block_read_rate: f64,
    pub block_write_rate: f64,
    pub pids_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<TrafficSplit<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classified_bytes: Option<TrafficSplit<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_source: Option<BytesSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Host the monitored containers run on, captured once per run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostInfo {
    pub hostname: String,
    pub cpu_model: String,
    pub cpu_cores: u32,
    pub memory_total: u64,
    pub architecture: String,
    pub os: String,
    pub kernel_version: String,
    pub runtime_version: String,
}

/// Resource limits declared on a container. Zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerLimits {
    pub cpu_quota: i64,
    pub cpu_period: i64,
    pub cpu_shares: i64,
    pub memory_limit: u64,
    pub memory_reservation: u64,
    pub memory_swap: i64,
    pub pids_limit: i64,
}

/// Aggregate statistics for a single metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p95: f64,
    pub p99: f64,
    /// Session delta, for cumulative metrics only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// Share of classified traffic per destination class, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkBreakdown {
    pub inter_container_pct: f64,
    pub internal_pct: f64,
    pub internet_pct: f64,
}

/// All aggregates for one container over one range of samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub cpu_percent: Summary,
    pub memory_usage: Summary,
    pub memory_percent: Summary,
    pub net_rx_rate: Summary,
    pub net_tx_rate: Summary,
    pub net_rx_total: u64,
    pub net_tx_total: u64,
    pub block_read_rate: Summary,
    pub block_write_rate: Summary,
    pub block_read_total: u64,
    pub block_write_total: u64,
    pub pids_count: Summary,
    pub sample_count: usize,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_breakdown: Option<NetworkBreakdown>,
}

/// Data transfer cost estimate for a session's egress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkCostEstimate {
    pub region: String,
    pub egress_gb: f64,
    pub ingress_gb: f64,
    pub estimated_cost_usd: f64,
    pub price_per_gb: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// Hardware architecture of an instance catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X86,
    Arm,
}

impl Architecture {
    /// Map a host architecture string (`x86_64`, `aarch64`, ...) to a catalog
    pub fn from_host(arch: &str) -> Self {
        match arch.to_ascii_lowercase().as_str() {
            "aarch64" | "arm64" | "arm" | "armv7l" => Architecture::Arm,
            _ => Architecture::X86,
        }
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Architecture::X86 => write!(f, "x86"),
            Architecture::Arm => write!(f, "arm"),
        }
    }
}

/// Suggested instance type for a workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecommendation {
    pub instance_type: String,
    pub vcpu: u32,
    pub memory_gb: f64,
    pub reason: String,
    pub hourly_price_usd: f64,
    pub architecture: Architecture,
}

/// The persisted record for one container within one monitoring config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSeries {
    pub container_id: String,
    pub container_name: String,
    pub image_name: String,
    pub host: HostInfo,
    pub limits: ContainerLimits,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub interval_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub samples: Vec<Sample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ContainerSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_cost: Option<NetworkCostEstimate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<InstanceRecommendation>,
}

/// One network attachment of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub network: String,
    pub addresses: Vec<IpAddr>,
}

/// Container listing entry returned by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub networks: Vec<NetworkEndpoint>,
}

/// Result of inspecting a single container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
    pub labels: BTreeMap<String, String>,
    pub limits: ContainerLimits,
    pub networks: Vec<NetworkEndpoint>,
}

impl ContainerDetails {
    /// Every address assigned to the container across its networks
    pub fn addresses(&self) -> impl Iterator<Item = &IpAddr> {
        self.networks.iter().flat_map(|n| n.addresses.iter())
    }
}

/// Raw cumulative counters from one runtime stats call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStats {
    /// Local time the snapshot was taken
    pub taken_at: DateTime<Utc>,
    pub cpu_total: u64,
    /// CPU total from the runtime's own previous reading
    pub precpu_total: u64,
    pub system_cpu: u64,
    pub presystem_cpu: u64,
    pub online_cpus: Option<u32>,
    pub percpu_count: usize,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_cache: u64,
    pub net_rx_bytes: u64,
    pub net_tx_bytes: u64,
    pub block_read: u64,
    pub block_write: u64,
    pub pids: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traffic_split_add_and_total() {
        let mut split = TrafficSplit::<u64>::default();
        split.add(TrafficClass::Internet, 10);
        split.add(TrafficClass::Internal, 5);
        split.add(TrafficClass::Internet, 1);

        assert_eq!(split.internet, 11);
        assert_eq!(split.internal, 5);
        assert_eq!(split.inter_container, 0);
        assert_eq!(split.total(), 16);
    }

    #[test]
    fn test_architecture_from_host() {
        assert_eq!(Architecture::from_host("x86_64"), Architecture::X86);
        assert_eq!(Architecture::from_host("aarch64"), Architecture::Arm);
        assert_eq!(Architecture::from_host("ARM64"), Architecture::Arm);
        assert_eq!(Architecture::from_host(""), Architecture::X86);
    }

    #[test]
    fn test_sample_omits_absent_classification() {
        let sample = Sample::default();
        let json = serde_json::to_string(&sample).unwrap();

        assert!(!json.contains("connections"));
        assert!(!json.contains("memory_percent"));
        assert!(!json.contains("session_id"));
    }
}
