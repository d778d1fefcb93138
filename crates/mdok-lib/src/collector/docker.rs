//! Docker Engine runtime client
//!
//! Implements [`RuntimeClient`] over the local Docker socket with bollard.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::path::Path;

use async_trait::async_trait;
use bollard::container::{
    InspectContainerOptions, ListContainersOptions, MemoryStatsStats, Stats, StatsOptions,
};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::EndpointSettings;
use bollard::Docker;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use tracing::debug;

use super::{RuntimeClient, RuntimeError, RuntimeResult};
use crate::models::{
    ContainerDetails, ContainerInfo, ContainerLimits, HostInfo, NetworkEndpoint, RawStats,
};

/// Runtime client backed by the Docker Engine API
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connect using the local defaults (`DOCKER_HOST` or the unix socket)
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }
}

fn map_error(context: &str, err: BollardError) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(context.to_string()),
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => RuntimeError::Api(format!("{} ({}): {}", context, status_code, message)),
        e @ (BollardError::JsonDataError { .. } | BollardError::JsonSerdeError { .. }) => {
            RuntimeError::Decode(format!("{}: {}", context, e))
        }
        e => RuntimeError::Unavailable(format!("{}: {}", context, e)),
    }
}

/// Addresses of every attached network, sorted by network name
fn endpoints(networks: Option<HashMap<String, EndpointSettings>>) -> Vec<NetworkEndpoint> {
    let mut endpoints: Vec<NetworkEndpoint> = networks
        .unwrap_or_default()
        .into_iter()
        .map(|(network, settings)| {
            let addresses = [settings.ip_address, settings.global_ipv6_address]
                .into_iter()
                .flatten()
                .filter_map(|a| a.parse::<IpAddr>().ok())
                .collect();
            NetworkEndpoint { network, addresses }
        })
        .collect();
    endpoints.sort_by(|a, b| a.network.cmp(&b.network));
    endpoints
}

fn clamp_u64(value: Option<i64>) -> u64 {
    value.unwrap_or(0).max(0) as u64
}

fn raw_stats(stats: Stats) -> RawStats {
    let (net_rx_bytes, net_tx_bytes) = stats
        .networks
        .unwrap_or_default()
        .values()
        .fold((0u64, 0u64), |(rx, tx), n| (rx + n.rx_bytes, tx + n.tx_bytes));

    let (block_read, block_write) = stats
        .blkio_stats
        .io_service_bytes_recursive
        .unwrap_or_default()
        .iter()
        .fold((0u64, 0u64), |(r, w), entry| {
            if entry.op.eq_ignore_ascii_case("read") {
                (r + entry.value, w)
            } else if entry.op.eq_ignore_ascii_case("write") {
                (r, w + entry.value)
            } else {
                (r, w)
            }
        });

    let memory_cache = match stats.memory_stats.stats {
        Some(MemoryStatsStats::V1(v1)) => v1.cache,
        Some(MemoryStatsStats::V2(v2)) => v2.file,
        None => 0,
    };

    RawStats {
        taken_at: Utc::now(),
        cpu_total: stats.cpu_stats.cpu_usage.total_usage,
        precpu_total: stats.precpu_stats.cpu_usage.total_usage,
        system_cpu: stats.cpu_stats.system_cpu_usage.unwrap_or(0),
        presystem_cpu: stats.precpu_stats.system_cpu_usage.unwrap_or(0),
        online_cpus: stats.cpu_stats.online_cpus.map(|n| n as u32),
        percpu_count: stats
            .cpu_stats
            .cpu_usage
            .percpu_usage
            .as_ref()
            .map_or(0, Vec::len),
        memory_usage: stats.memory_stats.usage.unwrap_or(0),
        memory_limit: stats.memory_stats.limit.unwrap_or(0),
        memory_cache,
        net_rx_bytes,
        net_tx_bytes,
        block_read,
        block_write,
        pids: stats.pids_stats.current.unwrap_or(0),
    }
}

#[async_trait]
impl RuntimeClient for DockerClient {
    async fn ping(&self) -> RuntimeResult<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Unavailable(e.to_string()))
    }

    async fn list_containers(&self, all: bool) -> RuntimeResult<Vec<ContainerInfo>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| map_error("list containers", e))?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerInfo {
                id: c.id.unwrap_or_default(),
                name: c
                    .names
                    .and_then(|n| n.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                status: c.status.unwrap_or_default(),
                created: c
                    .created
                    .and_then(|t| Utc.timestamp_opt(t, 0).single())
                    .unwrap_or_default(),
                labels: c.labels.unwrap_or_default().into_iter().collect(),
                networks: endpoints(c.network_settings.and_then(|n| n.networks)),
            })
            .collect())
    }

    async fn inspect(&self, container: &str) -> RuntimeResult<ContainerDetails> {
        let inspect = self
            .docker
            .inspect_container(container, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_error(container, e))?;

        let host = inspect.host_config.unwrap_or_default();
        let limits = ContainerLimits {
            cpu_quota: host.cpu_quota.unwrap_or(0),
            cpu_period: host.cpu_period.unwrap_or(0),
            cpu_shares: host.cpu_shares.unwrap_or(0),
            memory_limit: clamp_u64(host.memory),
            memory_reservation: clamp_u64(host.memory_reservation),
            memory_swap: host.memory_swap.unwrap_or(0),
            pids_limit: host.pids_limit.unwrap_or(0),
        };

        let config = inspect.config.unwrap_or_default();
        let labels: BTreeMap<String, String> =
            config.labels.unwrap_or_default().into_iter().collect();

        Ok(ContainerDetails {
            id: inspect.id.unwrap_or_else(|| container.to_string()),
            name: inspect
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| container.to_string()),
            image: config.image.unwrap_or_else(|| "unknown".to_string()),
            running: inspect.state.and_then(|s| s.running).unwrap_or(false),
            labels,
            limits,
            networks: endpoints(inspect.network_settings.and_then(|n| n.networks)),
        })
    }

    async fn stats(&self, container_id: &str) -> RuntimeResult<RawStats> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut stream = self.docker.stats(container_id, Some(options));

        match stream.next().await {
            Some(Ok(stats)) => Ok(raw_stats(stats)),
            Some(Err(e)) => Err(map_error(container_id, e)),
            None => Err(RuntimeError::Decode(format!(
                "no stats returned for {}",
                container_id
            ))),
        }
    }

    async fn exec_capture(&self, container_id: &str, cmd: &[&str]) -> RuntimeResult<String> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(cmd.iter().map(|s| s.to_string()).collect::<Vec<String>>()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| map_error(container_id, e))?;

        let started = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| map_error(container_id, e))?;

        let mut stdout = String::new();
        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(chunk) = output.next().await {
                match chunk {
                    Ok(bollard::container::LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(e) => return Err(map_error(container_id, e)),
                }
            }
        }

        Ok(stdout)
    }

    async fn host_info(&self) -> RuntimeResult<HostInfo> {
        let info = self
            .docker
            .info()
            .await
            .map_err(|e| map_error("host info", e))?;

        let runtime_version = match info.server_version {
            Some(v) => v,
            None => match self.docker.version().await {
                Ok(v) => v.version.unwrap_or_default(),
                Err(e) => {
                    debug!(error = %e, "Failed to query runtime version");
                    String::new()
                }
            },
        };

        Ok(HostInfo {
            hostname: info.name.unwrap_or_default(),
            cpu_model: read_cpu_model(Path::new("/proc/cpuinfo")),
            cpu_cores: info.ncpu.unwrap_or(0).max(0) as u32,
            memory_total: clamp_u64(info.mem_total),
            architecture: info.architecture.unwrap_or_default(),
            os: info.operating_system.unwrap_or_default(),
            kernel_version: info.kernel_version.unwrap_or_default(),
            runtime_version,
        })
    }
}

/// CPU model name from a cpuinfo file, `unknown` when unavailable
pub fn read_cpu_model(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| parse_cpu_model(&text))
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim() == "model name")
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_model() {
        let cpuinfo = "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Xeon(R) CPU @ 2.20GHz\n";
        assert_eq!(
            parse_cpu_model(cpuinfo).as_deref(),
            Some("Intel(R) Xeon(R) CPU @ 2.20GHz")
        );
        assert_eq!(parse_cpu_model("processor\t: 0\nBogoMIPS\t: 50.00\n"), None);
    }

    #[test]
    fn test_read_cpu_model_missing_file() {
        assert_eq!(read_cpu_model(Path::new("/nonexistent/cpuinfo")), "unknown");
    }

    #[test]
    fn test_endpoints_parse_addresses() {
        let mut networks = HashMap::new();
        networks.insert(
            "backend".to_string(),
            EndpointSettings {
                ip_address: Some("172.18.0.2".to_string()),
                global_ipv6_address: Some(String::new()),
                ..Default::default()
            },
        );
        networks.insert("bridge".to_string(), EndpointSettings::default());

        let parsed = endpoints(Some(networks));
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].network, "backend");
        assert_eq!(parsed[0].addresses, vec!["172.18.0.2".parse::<IpAddr>().unwrap()]);
        assert!(parsed[1].addresses.is_empty());
    }

    #[test]
    fn test_not_found_maps_to_typed_error() {
        let err = map_error(
            "web",
            BollardError::DockerResponseServerError {
                status_code: 404,
                message: "No such container: web".to_string(),
            },
        );
        assert!(err.is_not_found());
    }
}
