//! Report exports: full JSON, per-container CSV summary, Markdown and HTML reports

mod html;

use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::analysis::advisor;
use crate::models::{ContainerSeries, Summary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Markdown,
    Html,
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "html" | "htm" => Ok(ExportFormat::Html),
            other => bail!("unsupported format: {}", other),
        }
    }
}

/// Render `series` in the requested format
pub fn render(
    format: ExportFormat,
    run: &str,
    series: &[ContainerSeries],
    generated_at: DateTime<Utc>,
) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(series)?),
        ExportFormat::Csv => Ok(to_csv(series)),
        ExportFormat::Markdown => Ok(to_markdown(run, series, generated_at)),
        ExportFormat::Html => Ok(html::to_html(run, series, generated_at)),
    }
}

/// Human readable byte size, binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, suffix)
}

/// `format_bytes` for float aggregates; negative values render as zero
pub fn format_bytes_f64(bytes: f64) -> String {
    format_bytes(bytes.max(0.0) as u64)
}

/// First 12 characters of a runtime id
pub fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

const CSV_HEADER: [&str; 15] = [
    "Container",
    "Samples",
    "Duration",
    "CPU Min%",
    "CPU Avg%",
    "CPU Max%",
    "CPU P95%",
    "Mem Min",
    "Mem Avg",
    "Mem Max",
    "Mem P95",
    "Net Rx Total",
    "Net Tx Total",
    "Block Read Total",
    "Block Write Total",
];

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line(out: &mut String, fields: &[String]) {
    let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

/// One summary row per container that has a summary
fn to_csv(series: &[ContainerSeries]) -> String {
    let mut out = String::new();
    csv_line(&mut out, &CSV_HEADER.map(String::from));

    for data in series {
        let Some(s) = &data.summary else { continue };
        csv_line(
            &mut out,
            &[
                data.container_name.clone(),
                s.sample_count.to_string(),
                s.duration.clone(),
                format!("{:.2}", s.cpu_percent.min),
                format!("{:.2}", s.cpu_percent.avg),
                format!("{:.2}", s.cpu_percent.max),
                format!("{:.2}", s.cpu_percent.p95),
                format_bytes_f64(s.memory_usage.min),
                format_bytes_f64(s.memory_usage.avg),
                format_bytes_f64(s.memory_usage.max),
                format_bytes_f64(s.memory_usage.p95),
                format_bytes(s.net_rx_total),
                format_bytes(s.net_tx_total),
                format_bytes(s.block_read_total),
                format_bytes(s.block_write_total),
            ],
        );
    }

    out
}

fn pct_row(out: &mut String, label: &str, s: &Summary) {
    let _ = writeln!(
        out,
        "| {} | {:.1} | {:.1} | {:.1} | {:.1} | {:.1} |",
        label, s.min, s.avg, s.max, s.p95, s.p99
    );
}

fn bytes_row(out: &mut String, label: &str, s: &Summary) {
    let _ = writeln!(
        out,
        "| {} | {} | {} | {} | {} | {} |",
        label,
        format_bytes_f64(s.min),
        format_bytes_f64(s.avg),
        format_bytes_f64(s.max),
        format_bytes_f64(s.p95),
        format_bytes_f64(s.p99)
    );
}

fn to_markdown(run: &str, series: &[ContainerSeries], generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let rfc3339 = |t: DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);

    let _ = writeln!(out, "# Monitoring Report: {}\n", run);
    let _ = writeln!(out, "Generated: {}\n", rfc3339(generated_at));

    for data in series {
        let _ = writeln!(out, "## {}\n", data.container_name);
        let _ = writeln!(out, "- **Container ID:** {}", short_id(&data.container_id));
        let _ = writeln!(out, "- **Image:** {}", data.image_name);
        let _ = writeln!(out, "- **Host:** {}", data.host.hostname);
        if !data.host.architecture.is_empty() {
            let _ = writeln!(
                out,
                "- **Platform:** {} ({} cores, {})",
                data.host.architecture,
                data.host.cpu_cores,
                format_bytes(data.host.memory_total)
            );
        }
        if let Some(id) = &data.session_id {
            let _ = writeln!(out, "- **Session:** {}", id);
        }
        let _ = writeln!(out, "- **Start:** {}", rfc3339(data.start_time));
        if let Some(end) = data.end_time {
            let _ = writeln!(out, "- **End:** {}", rfc3339(end));
        }
        out.push('\n');

        let limits = &data.limits;
        if limits.memory_limit > 0 || limits.cpu_quota > 0 || limits.pids_limit > 0 {
            out.push_str("### Limits\n\n");
            if limits.memory_limit > 0 {
                let _ = writeln!(out, "- **Memory:** {}", format_bytes(limits.memory_limit));
            }
            if limits.cpu_quota > 0 && limits.cpu_period > 0 {
                let _ = writeln!(
                    out,
                    "- **CPU:** {:.2} cores",
                    limits.cpu_quota as f64 / limits.cpu_period as f64
                );
            }
            if limits.pids_limit > 0 {
                let _ = writeln!(out, "- **PIDs:** {}", limits.pids_limit);
            }
            out.push('\n');
        }

        let Some(s) = &data.summary else {
            out.push_str("_No data for the selected range._\n\n---\n\n");
            continue;
        };

        out.push_str("### Summary Statistics\n\n");
        let _ = writeln!(out, "- **Samples:** {}", s.sample_count);
        let _ = writeln!(out, "- **Duration:** {}\n", s.duration);

        out.push_str("| Metric | Min | Avg | Max | P95 | P99 |\n");
        out.push_str("|--------|-----|-----|-----|-----|-----|\n");
        pct_row(&mut out, "CPU %", &s.cpu_percent);
        bytes_row(&mut out, "Memory", &s.memory_usage);
        pct_row(&mut out, "Memory %", &s.memory_percent);
        bytes_row(&mut out, "Net Rx/s", &s.net_rx_rate);
        bytes_row(&mut out, "Net Tx/s", &s.net_tx_rate);
        pct_row(&mut out, "PIDs", &s.pids_count);
        out.push('\n');

        out.push_str("### Network & I/O Totals\n\n");
        let _ = writeln!(out, "- **Network Rx:** {}", format_bytes(s.net_rx_total));
        let _ = writeln!(out, "- **Network Tx:** {}", format_bytes(s.net_tx_total));
        let _ = writeln!(out, "- **Block Read:** {}", format_bytes(s.block_read_total));
        let _ = writeln!(out, "- **Block Write:** {}", format_bytes(s.block_write_total));
        out.push('\n');

        if let Some(b) = &s.network_breakdown {
            out.push_str("### Traffic Breakdown\n\n");
            let _ = writeln!(out, "- **Inter-container:** {:.1}%", b.inter_container_pct);
            let _ = writeln!(out, "- **Internal:** {:.1}%", b.internal_pct);
            let _ = writeln!(out, "- **Internet:** {:.1}%", b.internet_pct);
            out.push('\n');
        }

        if !s.warnings.is_empty() {
            out.push_str("### Warnings\n\n");
            for w in &s.warnings {
                let _ = writeln!(out, "- {}", w);
            }
            out.push('\n');
        }

        if let Some(cost) = &data.network_cost {
            out.push_str("### Network Cost Estimate\n\n");
            let _ = writeln!(out, "- **Region:** {}", cost.region);
            let _ = writeln!(out, "- **Egress:** {:.2} GB", cost.egress_gb);
            let _ = writeln!(out, "- **Estimated Cost:** ${:.2}", cost.estimated_cost_usd);
            out.push('\n');
        }

        let dual = advisor::recommend_both(s);
        if dual.x86.is_some() || dual.arm.is_some() {
            out.push_str("### Instance Recommendation\n\n");
            for rec in [&dual.x86, &dual.arm].into_iter().flatten() {
                let _ = writeln!(
                    out,
                    "- **{}:** {} ({} vCPU, {:.1} GB RAM) at ${:.4}/h. {}",
                    rec.architecture,
                    rec.instance_type,
                    rec.vcpu,
                    rec.memory_gb,
                    rec.hourly_price_usd,
                    rec.reason
                );
            }
            if let Some(savings) = dual.arm_savings_pct {
                let _ = writeln!(out, "- **arm savings:** {:.0}%", savings);
            }
            out.push('\n');
        }

        out.push_str("---\n\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContainerSummary, Sample};
    use crate::session;
    use chrono::TimeZone;

    pub(super) fn finished_series() -> ContainerSeries {
        let samples: Vec<Sample> = (0..4)
            .map(|i| Sample {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i * 5, 0).unwrap(),
                cpu_percent: 10.0 * (i + 1) as f64,
                memory_usage: 256 * 1024 * 1024,
                net_tx_bytes: 1000 * i as u64,
                ..Default::default()
            })
            .collect();
        let mut series = ContainerSeries {
            container_id: "0123456789abcdef0123".into(),
            container_name: "api,edge".into(),
            image_name: "corp/api:1.2".into(),
            start_time: samples[0].timestamp,
            interval_seconds: 5,
            samples,
            ..Default::default()
        };
        session::derive(&mut series, None);
        series
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("HTML".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(256 * 1024 * 1024), "256.0 MB");
        assert_eq!(format_bytes_f64(-3.0), "0 B");
    }

    #[test]
    fn test_csv_quotes_and_skips_unsummarized() {
        let empty = ContainerSeries {
            container_name: "idle".into(),
            ..Default::default()
        };
        let csv = to_csv(&[finished_series(), empty]);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Container,Samples,Duration"));
        assert!(lines[1].starts_with("\"api,edge\",4,15s,10.00,25.00,40.00,"));
    }

    #[test]
    fn test_markdown_sections() {
        let now = Utc.timestamp_opt(1_700_001_000, 0).unwrap();
        let md = render(ExportFormat::Markdown, "stack", &[finished_series()], now).unwrap();

        assert!(md.starts_with("# Monitoring Report: stack\n"));
        assert!(md.contains("- **Container ID:** 0123456789ab"));
        assert!(md.contains("| CPU % | 10.0 | 25.0 | 40.0 |"));
        assert!(md.contains("### Network Cost Estimate"));
        assert!(md.contains("t3.micro"));
        assert!(md.contains("t4g.micro"));
    }

    #[test]
    fn test_markdown_without_summary() {
        let series = ContainerSeries {
            container_id: "short".into(),
            container_name: "idle".into(),
            summary: None::<ContainerSummary>,
            ..Default::default()
        };
        let md = to_markdown("stack", &[series], Utc::now());
        assert!(md.contains("- **Container ID:** short"));
        assert!(md.contains("_No data for the selected range._"));
    }

    #[test]
    fn test_json_is_array_of_series() {
        let json = render(ExportFormat::Json, "stack", &[finished_series()], Utc::now()).unwrap();
        let parsed: Vec<ContainerSeries> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].samples.len(), 4);
    }
}
