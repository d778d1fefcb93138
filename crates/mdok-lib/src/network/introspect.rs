//! In-container network probing
//!
//! Reads connection tables from inside the target container and classifies
//! them against its peers. Every failure degrades to an empty probe.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;

use super::classify::{canonical, PeerSets, ProxyMatcher};
use crate::collector::RuntimeClient;
use crate::models::{BytesSource, ContainerDetails, Sample, TrafficSplit};

const CONNTRACK_CMD: &[&str] = &["cat", "/proc/net/nf_conntrack"];
const TCP_CMD: &[&str] = &["cat", "/proc/net/tcp"];
const TCP6_CMD: &[&str] = &["cat", "/proc/net/tcp6"];

/// Classified traffic for one container at one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkProbe {
    pub connections: Option<TrafficSplit<u64>>,
    pub classified_bytes: Option<TrafficSplit<u64>>,
    pub bytes_source: Option<BytesSource>,
}

impl NetworkProbe {
    pub fn is_empty(&self) -> bool {
        self.connections.is_none() && self.classified_bytes.is_none()
    }

    /// Copy the classification onto a sample
    pub fn apply(self, sample: &mut Sample) {
        sample.connections = self.connections;
        sample.classified_bytes = self.classified_bytes;
        sample.bytes_source = self.bytes_source;
    }

    fn from_counts(bytes: TrafficSplit<u64>, connections: TrafficSplit<u64>) -> Self {
        let has_bytes = bytes.total() > 0;
        let has_connections = connections.total() > 0;

        let bytes_source = if has_bytes {
            Some(BytesSource::Conntrack)
        } else if has_connections {
            Some(BytesSource::Estimated)
        } else {
            None
        };

        Self {
            connections: has_connections.then_some(connections),
            classified_bytes: has_bytes.then_some(bytes),
            bytes_source,
        }
    }
}

/// Probes container network state through the runtime client
pub struct NetworkInspector {
    client: Arc<dyn RuntimeClient>,
    matcher: ProxyMatcher,
}

impl NetworkInspector {
    pub fn new(client: Arc<dyn RuntimeClient>, matcher: ProxyMatcher) -> Self {
        Self { client, matcher }
    }

    pub fn matcher(&self) -> &ProxyMatcher {
        &self.matcher
    }

    pub async fn probe(&self, target: &ContainerDetails) -> NetworkProbe {
        let others = match self.client.list_containers(false).await {
            Ok(list) => list,
            Err(e) => {
                debug!(container = %target.name, error = %e, "Skipping traffic classification");
                return NetworkProbe::default();
            }
        };

        let peers = PeerSets::build(target, &others, &self.matcher);
        let own: HashSet<IpAddr> = target.addresses().map(|ip| canonical(*ip)).collect();

        let bytes = match self.read(&target.id, CONNTRACK_CMD).await {
            Some(text) => peers.sum_flow_bytes(&text, &own),
            None => TrafficSplit::default(),
        };

        let mut connections = TrafficSplit::default();
        for cmd in [TCP_CMD, TCP6_CMD] {
            if let Some(text) = self.read(&target.id, cmd).await {
                connections.merge(&peers.count_connections(&text));
            }
        }

        NetworkProbe::from_counts(bytes, connections)
    }

    async fn read(&self, container_id: &str, cmd: &[&str]) -> Option<String> {
        match self.client.exec_capture(container_id, cmd).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                debug!(container = %container_id, path = ?cmd.last(), error = %e, "Network table unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(inter: u64, internal: u64, internet: u64) -> TrafficSplit<u64> {
        TrafficSplit {
            inter_container: inter,
            internal,
            internet,
        }
    }

    #[test]
    fn test_bytes_take_precedence() {
        let probe = NetworkProbe::from_counts(split(10, 0, 5), split(1, 1, 1));
        assert_eq!(probe.bytes_source, Some(BytesSource::Conntrack));
        assert_eq!(probe.classified_bytes, Some(split(10, 0, 5)));
        assert_eq!(probe.connections, Some(split(1, 1, 1)));
    }

    #[test]
    fn test_connections_only_are_estimated() {
        let probe = NetworkProbe::from_counts(TrafficSplit::default(), split(0, 2, 0));
        assert_eq!(probe.bytes_source, Some(BytesSource::Estimated));
        assert_eq!(probe.classified_bytes, None);
    }

    #[test]
    fn test_nothing_observed_is_empty() {
        let probe = NetworkProbe::from_counts(TrafficSplit::default(), TrafficSplit::default());
        assert!(probe.is_empty());
        assert_eq!(probe.bytes_source, None);

        let mut sample = Sample::default();
        probe.apply(&mut sample);
        assert!(sample.connections.is_none());
    }
}
