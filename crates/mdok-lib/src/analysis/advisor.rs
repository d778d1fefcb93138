//! Egress cost estimation and instance sizing
//!
//! Uses a flat per-GB data transfer price per region and two ordered
//! instance catalogs (x86 and arm). Sizing picks the first catalog entry
//! that fits the workload's p95 usage plus headroom, so catalog order is
//! the smallest-fit policy.

use serde::{Deserialize, Serialize};

use crate::models::{Architecture, ContainerSummary, InstanceRecommendation, NetworkCostEstimate};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Headroom applied on top of p95 usage when sizing
const HEADROOM: f64 = 1.2;

pub const DEFAULT_REGION: &str = "us-east-1";

const DEFAULT_PRICE_PER_GB: f64 = 0.09;

const COST_NOTES: &str = "Estimate based on standard data transfer rates. Actual costs may vary.";

/// One entry of an instance catalog
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceType {
    pub name: &'static str,
    pub vcpu: u32,
    pub memory_gb: f64,
    pub hourly_usd: f64,
}

const fn instance(name: &'static str, vcpu: u32, memory_gb: f64, hourly_usd: f64) -> InstanceType {
    InstanceType {
        name,
        vcpu,
        memory_gb,
        hourly_usd,
    }
}

/// x86 catalog in selection order
pub const X86_CATALOG: &[InstanceType] = &[
    instance("t3.micro", 2, 1.0, 0.0104),
    instance("t3.small", 2, 2.0, 0.0208),
    instance("t3.medium", 2, 4.0, 0.0416),
    instance("t3.large", 2, 8.0, 0.0832),
    instance("t3.xlarge", 4, 16.0, 0.1664),
    instance("m5.large", 2, 8.0, 0.096),
    instance("m5.xlarge", 4, 16.0, 0.192),
    instance("m5.2xlarge", 8, 32.0, 0.384),
    instance("c5.large", 2, 4.0, 0.085),
    instance("c5.xlarge", 4, 8.0, 0.17),
    instance("c5.2xlarge", 8, 16.0, 0.34),
    instance("r5.large", 2, 16.0, 0.126),
    instance("r5.xlarge", 4, 32.0, 0.252),
];

/// arm (Graviton) catalog in selection order
pub const ARM_CATALOG: &[InstanceType] = &[
    instance("t4g.micro", 2, 1.0, 0.0084),
    instance("t4g.small", 2, 2.0, 0.0168),
    instance("t4g.medium", 2, 4.0, 0.0336),
    instance("t4g.large", 2, 8.0, 0.0672),
    instance("t4g.xlarge", 4, 16.0, 0.1344),
    instance("m7g.large", 2, 8.0, 0.0816),
    instance("m7g.xlarge", 4, 16.0, 0.1632),
    instance("m7g.2xlarge", 8, 32.0, 0.3264),
    instance("c7g.large", 2, 4.0, 0.0725),
    instance("c7g.xlarge", 4, 8.0, 0.145),
    instance("c7g.2xlarge", 8, 16.0, 0.29),
    instance("r7g.large", 2, 16.0, 0.1008),
    instance("r7g.xlarge", 4, 32.0, 0.2016),
];

pub fn catalog(arch: Architecture) -> &'static [InstanceType] {
    match arch {
        Architecture::X86 => X86_CATALOG,
        Architecture::Arm => ARM_CATALOG,
    }
}

/// Data transfer out price per GB for a known region
pub fn price_per_gb(region: &str) -> Option<f64> {
    match region {
        "us-east-1" | "us-west-2" | "eu-west-1" => Some(0.09),
        "ap-southeast-1" => Some(0.12),
        _ => None,
    }
}

/// Flat-rate egress cost. Ingress is free.
///
/// An unknown region is priced at the default rate but still reported
/// under the requested name.
pub fn estimate_cost(egress_bytes: u64, region: Option<&str>) -> NetworkCostEstimate {
    let region = region.filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REGION);
    let price = price_per_gb(region).unwrap_or(DEFAULT_PRICE_PER_GB);
    let egress_gb = egress_bytes as f64 / GIB;

    NetworkCostEstimate {
        region: region.to_string(),
        egress_gb,
        ingress_gb: 0.0,
        estimated_cost_usd: egress_gb * price,
        price_per_gb: price,
        notes: COST_NOTES.to_string(),
    }
}

/// Sizing requirement derived from a summary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Requirements {
    pub cores: f64,
    pub memory_gb: f64,
    pub cpu_bound: bool,
}

impl Requirements {
    pub fn from_summary(summary: &ContainerSummary) -> Self {
        Self {
            cores: summary.cpu_percent.p95 / 100.0 * HEADROOM,
            memory_gb: summary.memory_usage.p95 / GIB * HEADROOM,
            cpu_bound: summary.cpu_percent.p95 > summary.memory_percent.p95,
        }
    }

    fn fits(&self, instance: &InstanceType) -> bool {
        instance.vcpu as f64 >= self.cores && instance.memory_gb >= self.memory_gb
    }
}

/// Pick the first entry of `catalog` that fits `required`.
///
/// Falls back to the catalog's last entry when nothing fits; `None` only for
/// an empty catalog.
pub fn select<'a>(catalog: &'a [InstanceType], required: &Requirements) -> Option<(&'a InstanceType, bool)> {
    catalog
        .iter()
        .find(|i| required.fits(i))
        .map(|i| (i, true))
        .or_else(|| catalog.last().map(|i| (i, false)))
}

/// Recommend from an explicit catalog
pub fn recommend_from(
    catalog: &[InstanceType],
    summary: &ContainerSummary,
    arch: Architecture,
) -> Option<InstanceRecommendation> {
    let required = Requirements::from_summary(summary);
    let (instance, fits) = select(catalog, &required)?;

    let reason = if !fits {
        "Resource requirements exceed common instance sizes".to_string()
    } else if required.cpu_bound {
        format!("CPU-bound workload (P95: {:.1}%)", summary.cpu_percent.p95)
    } else {
        format!(
            "Memory-bound workload (P95: {:.1}%, {:.2} GB)",
            summary.memory_percent.p95,
            summary.memory_usage.p95 / GIB
        )
    };

    Some(InstanceRecommendation {
        instance_type: instance.name.to_string(),
        vcpu: instance.vcpu,
        memory_gb: instance.memory_gb,
        reason,
        hourly_price_usd: instance.hourly_usd,
        architecture: arch,
    })
}

/// Recommend an instance type from the architecture's catalog
pub fn recommend(summary: &ContainerSummary, arch: Architecture) -> Option<InstanceRecommendation> {
    recommend_from(catalog(arch), summary, arch)
}

/// Side-by-side recommendation for both catalogs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualRecommendation {
    pub x86: Option<InstanceRecommendation>,
    pub arm: Option<InstanceRecommendation>,
    /// Hourly savings of arm over x86 in percent
    pub arm_savings_pct: Option<f64>,
}

pub fn recommend_both(summary: &ContainerSummary) -> DualRecommendation {
    let x86 = recommend(summary, Architecture::X86);
    let arm = recommend(summary, Architecture::Arm);

    let arm_savings_pct = match (&x86, &arm) {
        (Some(x), Some(a)) if x.hourly_price_usd > 0.0 => {
            Some((x.hourly_price_usd - a.hourly_price_usd) / x.hourly_price_usd * 100.0)
        }
        _ => None,
    };

    DualRecommendation {
        x86,
        arm,
        arm_savings_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Summary;

    fn workload(cpu_p95: f64, mem_bytes_p95: f64, mem_pct_p95: f64) -> ContainerSummary {
        ContainerSummary {
            cpu_percent: Summary {
                p95: cpu_p95,
                ..Default::default()
            },
            memory_usage: Summary {
                p95: mem_bytes_p95,
                ..Default::default()
            },
            memory_percent: Summary {
                p95: mem_pct_p95,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_cost_default_region() {
        let estimate = estimate_cost(2 * 1024 * 1024 * 1024, None);

        assert_eq!(estimate.region, "us-east-1");
        assert_eq!(estimate.egress_gb, 2.0);
        assert_eq!(estimate.ingress_gb, 0.0);
        assert!((estimate.estimated_cost_usd - 0.18).abs() < 1e-12);
        assert_eq!(estimate.notes, COST_NOTES);
    }

    #[test]
    fn test_cost_known_region() {
        let estimate = estimate_cost(1024 * 1024 * 1024, Some("ap-southeast-1"));
        assert_eq!(estimate.price_per_gb, 0.12);
        assert!((estimate.estimated_cost_usd - 0.12).abs() < 1e-12);
    }

    #[test]
    fn test_cost_unknown_region_keeps_name() {
        let estimate = estimate_cost(0, Some("mars-north-1"));
        assert_eq!(estimate.region, "mars-north-1");
        assert_eq!(estimate.price_per_gb, DEFAULT_PRICE_PER_GB);
        assert_eq!(estimate.estimated_cost_usd, 0.0);
    }

    #[test]
    fn test_selection_follows_catalog_order() {
        let catalog = [
            instance("a", 2, 1.0, 0.01),
            instance("b", 2, 2.0, 0.02),
            instance("c", 2, 4.0, 0.04),
        ];
        let required = Requirements {
            cores: 1.1,
            memory_gb: 1.1,
            cpu_bound: false,
        };

        let (picked, fits) = select(&catalog, &required).unwrap();
        assert_eq!(picked.name, "b");
        assert!(fits);
    }

    #[test]
    fn test_recommend_from_custom_catalog() {
        let catalog = [
            instance("a", 2, 1.0, 0.01),
            instance("b", 2, 2.0, 0.02),
            instance("c", 2, 4.0, 0.04),
        ];
        // 1.1 cores and 1.1 GiB after headroom
        let summary = workload(110.0 / 1.2, 1.1 / 1.2 * GIB, 10.0);

        let rec = recommend_from(&catalog, &summary, Architecture::X86).unwrap();
        assert_eq!(rec.instance_type, "b");
        assert!(rec.reason.starts_with("CPU-bound"));
    }

    #[test]
    fn test_oversized_workload_gets_largest_entry() {
        let summary = workload(2000.0, 64.0 * GIB, 50.0);

        let rec = recommend(&summary, Architecture::Arm).unwrap();
        assert_eq!(rec.instance_type, "r7g.xlarge");
        assert_eq!(rec.reason, "Resource requirements exceed common instance sizes");
        assert_eq!(rec.architecture, Architecture::Arm);
    }

    #[test]
    fn test_memory_bound_reason() {
        let summary = workload(5.0, 0.5 * GIB, 40.0);

        let rec = recommend(&summary, Architecture::X86).unwrap();
        assert_eq!(rec.instance_type, "t3.micro");
        assert_eq!(rec.reason, "Memory-bound workload (P95: 40.0%, 0.50 GB)");
    }

    #[test]
    fn test_empty_catalog() {
        assert!(recommend_from(&[], &workload(1.0, 1.0, 1.0), Architecture::X86).is_none());
    }

    #[test]
    fn test_recommend_both_savings() {
        let dual = recommend_both(&workload(10.0, 0.5 * GIB, 5.0));

        assert_eq!(dual.x86.as_ref().unwrap().instance_type, "t3.micro");
        assert_eq!(dual.arm.as_ref().unwrap().instance_type, "t4g.micro");
        let savings = dual.arm_savings_pct.unwrap();
        assert!((savings - (0.0104 - 0.0084) / 0.0104 * 100.0).abs() < 1e-9);
    }
}
