//! Summary rendering for a monitoring run

use anyhow::Result;
use colored::Colorize;
use mdok_lib::analysis::{recommend_both, DualRecommendation, MetricKind};
use mdok_lib::export::{format_bytes, short_id};
use mdok_lib::{ContainerSeries, ContainerSummary, SeriesStore};
use tabled::{settings::Style, Table, Tabled};

use super::{load_views, FilterArgs};
use crate::output::{
    color_percent, format_currency, format_metric, print_json, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Avg")]
    avg: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "P95")]
    p95: String,
    #[tabled(rename = "P99")]
    p99: String,
}

fn metric_rows(summary: &ContainerSummary) -> Vec<MetricRow> {
    MetricKind::ALL
        .iter()
        .map(|&kind| {
            let s = kind.of(summary);
            MetricRow {
                metric: kind.label(),
                min: format_metric(kind, s.min),
                avg: format_metric(kind, s.avg),
                max: format_metric(kind, s.max),
                p95: format_metric(kind, s.p95),
                p99: format_metric(kind, s.p99),
            }
        })
        .collect()
}

/// Show the summary of every container in a run
pub fn show_summary(
    store: &SeriesStore,
    name: &str,
    filter: &FilterArgs,
    format: OutputFormat,
) -> Result<()> {
    let views = load_views(store, name, filter)?;

    match format {
        OutputFormat::Json => print_json(&views),
        OutputFormat::Table => {
            println!("{} {}", "Monitoring summary:".bold(), name.cyan());
            for view in &views {
                println!();
                print_container(view);
            }
        }
    }

    Ok(())
}

fn print_container(series: &ContainerSeries) {
    println!(
        "{} ({}) {}",
        series.container_name.bold(),
        short_id(&series.container_id).dimmed(),
        series.image_name
    );
    println!("{}", "=".repeat(60));

    let Some(summary) = &series.summary else {
        print_warning("No samples in the selected range");
        return;
    };

    if let Some(session) = &series.session_id {
        println!("Session:                {}", session);
    }
    println!("Duration:               {}", summary.duration);
    println!("Samples:                {}", summary.sample_count);
    if series.limits.memory_limit > 0 {
        println!(
            "Memory limit:           {} (peak {})",
            format_bytes(series.limits.memory_limit),
            color_percent(summary.memory_percent.max)
        );
    }
    println!();

    let table = Table::new(metric_rows(summary))
        .with(Style::rounded())
        .to_string();
    println!("{}", table);

    println!(
        "Network:                RX {}  TX {}",
        format_bytes(summary.net_rx_total),
        format_bytes(summary.net_tx_total)
    );
    println!(
        "Block I/O:              read {}  write {}",
        format_bytes(summary.block_read_total),
        format_bytes(summary.block_write_total)
    );

    if let Some(breakdown) = &summary.network_breakdown {
        println!(
            "Traffic:                inter-container {:.1}%  internal {:.1}%  internet {:.1}%",
            breakdown.inter_container_pct, breakdown.internal_pct, breakdown.internet_pct
        );
    }

    if let Some(cost) = &series.network_cost {
        println!(
            "Egress cost:            {} ({:.3} GB at {}/GB, {})",
            format_currency(cost.estimated_cost_usd).green(),
            cost.egress_gb,
            format_currency(cost.price_per_gb),
            cost.region
        );
    }

    for line in recommendation_lines(&recommend_both(summary)) {
        println!("{}", line);
    }

    if summary.warnings.is_empty() {
        println!("{}", "No warnings".green());
    } else {
        println!();
        for warning in &summary.warnings {
            print_warning(warning);
        }
    }
}

/// Instance lines per architecture, each followed by its own reason
fn recommendation_lines(dual: &DualRecommendation) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(x86) = &dual.x86 {
        lines.push(format!(
            "Instance (x86):         {} ({} vCPU, {} GB, {}/h)",
            x86.instance_type.cyan(),
            x86.vcpu,
            x86.memory_gb,
            format_currency(x86.hourly_price_usd)
        ));
        lines.push(format!("  Reason:               {}", x86.reason.dimmed()));
    }
    if let Some(arm) = &dual.arm {
        let savings = dual
            .arm_savings_pct
            .map(|p| format!(", {:.0}% cheaper", p))
            .unwrap_or_default();
        lines.push(format!(
            "Instance (arm):         {} ({} vCPU, {} GB, {}/h{})",
            arm.instance_type.cyan(),
            arm.vcpu,
            arm.memory_gb,
            format_currency(arm.hourly_price_usd),
            savings
        ));
        lines.push(format!("  Reason:               {}", arm.reason.dimmed()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdok_lib::{Architecture, InstanceRecommendation};

    #[test]
    fn test_metric_rows_cover_every_metric() {
        let summary = ContainerSummary::default();
        let rows = metric_rows(&summary);
        assert_eq!(rows.len(), MetricKind::ALL.len());
        assert_eq!(rows[0].metric, "CPU %");
        assert_eq!(rows[0].max, "0.0%");
    }

    #[test]
    fn test_each_architecture_shows_its_own_reason() {
        let rec = |instance: &str, arch, reason: &str| InstanceRecommendation {
            instance_type: instance.into(),
            vcpu: 2,
            memory_gb: 1.0,
            reason: reason.into(),
            hourly_price_usd: 0.01,
            architecture: arch,
        };
        let dual = DualRecommendation {
            x86: Some(rec("t3.micro", Architecture::X86, "x86 sized for 0.4 vCPU")),
            arm: Some(rec("t4g.micro", Architecture::Arm, "arm sized for 0.4 vCPU")),
            arm_savings_pct: Some(20.0),
        };

        let lines = recommendation_lines(&dual);

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("t3.micro"));
        assert!(lines[1].contains("x86 sized for 0.4 vCPU"));
        assert!(lines[2].contains("t4g.micro"));
        assert!(lines[3].contains("arm sized for 0.4 vCPU"));
        assert!(!lines[3].contains("x86"));
    }

    #[test]
    fn test_missing_architecture_has_no_reason_line() {
        let dual = DualRecommendation {
            x86: None,
            arm: None,
            arm_savings_pct: None,
        };
        assert!(recommendation_lines(&dual).is_empty());
    }
}
