//! Destination classification for container traffic
//!
//! Buckets connections and conntrack flows into inter-container, internal and
//! internet traffic. Proxy containers are treated as internet egress since
//! they relay traffic outward.

use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::models::{ContainerDetails, ContainerInfo, TrafficClass, TrafficSplit};

/// Label that overrides proxy detection in either direction
pub const PROXY_LABEL: &str = "mdok.proxy";

/// Image/name substrings that mark reverse proxies and API gateways
pub const DEFAULT_PROXY_PATTERNS: &[&str] =
    &["traefik", "nginx", "caddy", "haproxy", "envoy", "litellm"];

/// Compare IPv4-mapped IPv6 addresses in their IPv4 form
pub fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

/// Loopback, RFC1918, link-local, unique-local and link-local multicast
pub fn is_private(ip: IpAddr) -> bool {
    match canonical(ip) {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    ip.is_loopback()
        || a == 10
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
        || (a == 169 && b == 254)
        // 224.0.0.0/24
        || (a == 224 && b == 0 && c == 0)
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        // fc00::/7
        || (first & 0xfe00) == 0xfc00
        // fe80::/10
        || (first & 0xffc0) == 0xfe80
        // ff02::/16
        || first == 0xff02
}

/// Decides whether a container is an egress proxy
#[derive(Debug, Clone)]
pub struct ProxyMatcher {
    patterns: Vec<String>,
}

impl Default for ProxyMatcher {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl ProxyMatcher {
    /// Built-in patterns plus extra gateway image patterns
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<String> = DEFAULT_PROXY_PATTERNS.iter().map(|p| p.to_string()).collect();
        for p in extra {
            let p = p.as_ref().trim().to_lowercase();
            if !p.is_empty() && !patterns.contains(&p) {
                patterns.push(p);
            }
        }
        Self { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// An explicit label wins; otherwise substring match on image and name
    pub fn is_proxy(&self, image: &str, name: &str, labels: &BTreeMap<String, String>) -> bool {
        if let Some(value) = labels.get(PROXY_LABEL) {
            return label_truthy(value);
        }

        let image = image.to_lowercase();
        let name = name.to_lowercase();
        self.patterns
            .iter()
            .any(|p| image.contains(p.as_str()) || name.contains(p.as_str()))
    }

    pub fn is_proxy_container(&self, container: &ContainerInfo) -> bool {
        self.is_proxy(&container.image, &container.name, &container.labels)
    }
}

/// `true`/`yes`/`1` mark a proxy; anything else, including unknown values,
/// marks a non-proxy
fn label_truthy(value: &str) -> bool {
    ["true", "yes", "1"]
        .iter()
        .any(|v| value.trim().eq_ignore_ascii_case(v))
}

/// Known peer addresses for one target container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerSets {
    /// Non-proxy containers sharing a network with the target
    pub containers: HashSet<IpAddr>,
    /// Every proxy container on the host
    pub proxies: HashSet<IpAddr>,
}

impl PeerSets {
    pub fn build(target: &ContainerDetails, all: &[ContainerInfo], matcher: &ProxyMatcher) -> Self {
        let target_networks: HashSet<&str> = target.networks.iter().map(|n| n.network.as_str()).collect();
        let mut sets = PeerSets::default();

        for container in all.iter().filter(|c| c.id != target.id) {
            let addresses = container
                .networks
                .iter()
                .flat_map(|n| n.addresses.iter())
                .map(|ip| canonical(*ip));

            if matcher.is_proxy_container(container) {
                sets.proxies.extend(addresses);
                continue;
            }

            let shares_network = container
                .networks
                .iter()
                .any(|n| target_networks.contains(n.network.as_str()));
            if shares_network {
                sets.containers.extend(addresses);
            }
        }

        sets
    }

    /// First match wins: proxy, peer, private, internet.
    /// Unspecified destinations are not classified.
    pub fn classify(&self, destination: IpAddr) -> Option<TrafficClass> {
        let ip = canonical(destination);
        if ip.is_unspecified() {
            return None;
        }

        let class = if self.proxies.contains(&ip) {
            TrafficClass::Internet
        } else if self.containers.contains(&ip) {
            TrafficClass::InterContainer
        } else if is_private(ip) {
            TrafficClass::Internal
        } else {
            TrafficClass::Internet
        };
        Some(class)
    }

    /// Count connections per class from `/proc/net/tcp{,6}` contents
    pub fn count_connections(&self, proc_net_tcp: &str) -> TrafficSplit<u64> {
        let mut split = TrafficSplit::default();
        for ip in parse_proc_net_tcp(proc_net_tcp) {
            if let Some(class) = self.classify(ip) {
                split.add(class, 1);
            }
        }
        split
    }

    /// Sum conntrack flow bytes per class for flows originating at `own`
    pub fn sum_flow_bytes(&self, conntrack: &str, own: &HashSet<IpAddr>) -> TrafficSplit<u64> {
        let mut split = TrafficSplit::default();
        for flow in parse_conntrack(conntrack) {
            if !own.contains(&canonical(flow.src)) {
                continue;
            }
            if let Some(class) = self.classify(flow.dst) {
                split.add(class, flow.bytes);
            }
        }
        split
    }
}

/// Decode a little-endian hex address from the kernel socket tables.
///
/// `0100007F` is 127.0.0.1; IPv6 addresses are four little-endian words.
pub fn parse_hex_ip(hex: &str) -> Option<IpAddr> {
    match hex.len() {
        8 => {
            let word = u32::from_str_radix(hex, 16).ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(word.to_le_bytes())))
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
                let word = u32::from_str_radix(hex.get(i * 8..(i + 1) * 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_le_bytes());
            }
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

/// Remote addresses of every socket row, header skipped
pub fn parse_proc_net_tcp(contents: &str) -> Vec<IpAddr> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let remote = line.split_whitespace().nth(2)?;
            let (hex_ip, _port) = remote.split_once(':')?;
            parse_hex_ip(hex_ip)
        })
        .collect()
}

/// One conntrack entry, original direction only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub bytes: u64,
}

/// Parse `/proc/net/nf_conntrack`. Malformed lines are skipped.
pub fn parse_conntrack(contents: &str) -> Vec<Flow> {
    contents
        .lines()
        .filter(|line| line.contains("src=") && line.contains("bytes="))
        .filter_map(|line| {
            Some(Flow {
                src: field(line, "src=")?.parse().ok()?,
                dst: field(line, "dst=")?.parse().ok()?,
                bytes: field(line, "bytes=")?.parse().ok()?,
            })
        })
        .collect()
}

/// Value of the first `key=value` token with this key
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.split_whitespace()
        .find_map(|token| token.strip_prefix(key))
        .filter(|v| !v.is_empty())
}
