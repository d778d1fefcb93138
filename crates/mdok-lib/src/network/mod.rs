//! Container traffic classification

pub mod classify;
mod introspect;

pub use classify::{is_private, PeerSets, ProxyMatcher, DEFAULT_PROXY_PATTERNS, PROXY_LABEL};
pub use introspect::{NetworkInspector, NetworkProbe};
