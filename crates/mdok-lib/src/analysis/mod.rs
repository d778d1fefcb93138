//! Derived analysis over collected samples
//!
//! This module provides:
//! - Session aggregation (percentiles, reset-aware totals, traffic breakdown)
//! - Rule-based resource warnings
//! - Egress cost estimates and instance sizing for x86 and arm catalogs

pub mod advisor;
pub mod stats;
pub mod warnings;

pub use advisor::{estimate_cost, recommend, recommend_both, DualRecommendation, InstanceType};
pub use stats::{aggregate, percentile, summarize, CounterKind, MetricKind};
pub use warnings::{detect, Warning};
