//! Self-contained HTML report
//!
//! One page with inline styles and inline SVG charts. Nothing is fetched
//! when the file is opened, so the report can be mailed or archived as is.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use super::{format_bytes, format_bytes_f64, short_id};
use crate::analysis::advisor;
use crate::models::{ContainerSeries, Sample, Summary};

const CHART_WIDTH: f64 = 640.0;
const CHART_HEIGHT: f64 = 160.0;
const MIB: f64 = 1024.0 * 1024.0;

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;margin:2rem auto;max-width:960px;color:#222}\
h1{border-bottom:2px solid #ddd;padding-bottom:.3rem}\
section{border-top:1px solid #ddd;margin-top:2rem}\
table{border-collapse:collapse;margin:.5rem 0}\
th,td{border:1px solid #ccc;padding:.25rem .6rem;text-align:right}\
th:first-child,td:first-child{text-align:left}\
.meta{color:#666}\
.warn{color:#a40}\
figure{margin:1rem 0}\
svg{background:#fafafa;border:1px solid #ddd}\
polyline{fill:none;stroke-width:1.5}\
.cpu{stroke:#1f77b4}\
.mem{stroke:#2ca02c}";

/// Escape text for element content and quoted attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Polyline points scaled into the chart box, x by time and y by value
fn chart_points(samples: &[Sample], value: impl Fn(&Sample) -> f64) -> (String, f64) {
    let peak = samples.iter().map(&value).fold(0.0_f64, f64::max);
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return (String::new(), peak);
    };

    let span = (last.timestamp - first.timestamp).num_milliseconds() as f64;
    let scale = if peak > 0.0 { peak } else { 1.0 };
    let points: Vec<String> = samples
        .iter()
        .map(|s| {
            let x = if span > 0.0 {
                (s.timestamp - first.timestamp).num_milliseconds() as f64 / span * CHART_WIDTH
            } else {
                CHART_WIDTH / 2.0
            };
            let y = CHART_HEIGHT - value(s).max(0.0) / scale * CHART_HEIGHT;
            format!("{:.1},{:.1}", x, y)
        })
        .collect();
    (points.join(" "), peak)
}

fn line_chart(out: &mut String, title: &str, class: &str, points: &str, peak_label: &str) {
    let _ = writeln!(out, "<figure>");
    let _ = writeln!(
        out,
        "<svg role=\"img\" aria-label=\"{title}\" viewBox=\"0 0 {w} {h}\" width=\"{w}\" height=\"{h}\">",
        title = escape(title),
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    );
    let _ = writeln!(out, "<polyline class=\"{}\" points=\"{}\"/>", class, points);
    out.push_str("</svg>\n");
    let _ = writeln!(
        out,
        "<figcaption>{} (peak {})</figcaption>",
        escape(title),
        escape(peak_label)
    );
    out.push_str("</figure>\n");
}

fn info_row(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "<tr><th>{}</th><td>{}</td></tr>", label, escape(value));
}

fn metric_row(out: &mut String, label: &str, s: &Summary, fmt: impl Fn(f64) -> String) {
    let _ = writeln!(
        out,
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        label,
        fmt(s.min),
        fmt(s.avg),
        fmt(s.max),
        fmt(s.p95),
        fmt(s.p99)
    );
}

fn container_section(out: &mut String, data: &ContainerSeries) {
    let rfc3339 = |t: DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);

    out.push_str("<section>\n");
    let _ = writeln!(out, "<h2>{}</h2>", escape(&data.container_name));

    out.push_str("<table class=\"info\">\n");
    info_row(out, "Container ID", short_id(&data.container_id));
    info_row(out, "Image", &data.image_name);
    info_row(out, "Host", &data.host.hostname);
    if !data.host.architecture.is_empty() {
        info_row(
            out,
            "Platform",
            &format!(
                "{} ({} cores, {})",
                data.host.architecture,
                data.host.cpu_cores,
                format_bytes(data.host.memory_total)
            ),
        );
    }
    if let Some(id) = &data.session_id {
        info_row(out, "Session", id);
    }
    info_row(out, "Start", &rfc3339(data.start_time));
    if let Some(end) = data.end_time {
        info_row(out, "End", &rfc3339(end));
    }
    if data.limits.memory_limit > 0 {
        info_row(out, "Memory limit", &format_bytes(data.limits.memory_limit));
    }
    out.push_str("</table>\n");

    let Some(s) = &data.summary else {
        out.push_str("<p class=\"meta\">No data for the selected range.</p>\n</section>\n");
        return;
    };

    let _ = writeln!(
        out,
        "<p class=\"meta\">{} samples over {}</p>",
        s.sample_count,
        escape(&s.duration)
    );

    out.push_str("<table class=\"metrics\">\n");
    out.push_str("<tr><th>Metric</th><th>Min</th><th>Avg</th><th>Max</th><th>P95</th><th>P99</th></tr>\n");
    let pct = |v: f64| format!("{:.1}", v);
    metric_row(out, "CPU %", &s.cpu_percent, pct);
    metric_row(out, "Memory", &s.memory_usage, format_bytes_f64);
    metric_row(out, "Memory %", &s.memory_percent, pct);
    metric_row(out, "Net Rx/s", &s.net_rx_rate, format_bytes_f64);
    metric_row(out, "Net Tx/s", &s.net_tx_rate, format_bytes_f64);
    metric_row(out, "PIDs", &s.pids_count, pct);
    out.push_str("</table>\n");

    let _ = writeln!(
        out,
        "<p>Network Rx {} &middot; Tx {} &middot; Block read {} &middot; write {}</p>",
        format_bytes(s.net_rx_total),
        format_bytes(s.net_tx_total),
        format_bytes(s.block_read_total),
        format_bytes(s.block_write_total)
    );

    let (cpu, cpu_peak) = chart_points(&data.samples, |s| s.cpu_percent);
    line_chart(out, "CPU %", "cpu", &cpu, &format!("{:.1}%", cpu_peak));
    let (mem, mem_peak) = chart_points(&data.samples, |s| s.memory_usage as f64 / MIB);
    line_chart(
        out,
        "Memory (MiB)",
        "mem",
        &mem,
        &format_bytes_f64(mem_peak * MIB),
    );

    if let Some(b) = &s.network_breakdown {
        let _ = writeln!(
            out,
            "<p>Traffic: inter-container {:.1}%, internal {:.1}%, internet {:.1}%</p>",
            b.inter_container_pct, b.internal_pct, b.internet_pct
        );
    }

    if !s.warnings.is_empty() {
        out.push_str("<h3>Warnings</h3>\n<ul class=\"warn\">\n");
        for w in &s.warnings {
            let _ = writeln!(out, "<li>{}</li>", escape(&w.to_string()));
        }
        out.push_str("</ul>\n");
    }

    if let Some(cost) = &data.network_cost {
        let _ = writeln!(
            out,
            "<p>Egress {:.2} GB in {} at an estimated ${:.2}</p>",
            cost.egress_gb,
            escape(&cost.region),
            cost.estimated_cost_usd
        );
    }

    let dual = advisor::recommend_both(s);
    if dual.x86.is_some() || dual.arm.is_some() {
        out.push_str("<h3>Instance Recommendation</h3>\n<ul>\n");
        for rec in [&dual.x86, &dual.arm].into_iter().flatten() {
            let _ = writeln!(
                out,
                "<li><b>{}:</b> {} ({} vCPU, {:.1} GB RAM) at ${:.4}/h. {}</li>",
                rec.architecture,
                escape(&rec.instance_type),
                rec.vcpu,
                rec.memory_gb,
                rec.hourly_price_usd,
                escape(&rec.reason)
            );
        }
        if let Some(savings) = dual.arm_savings_pct {
            let _ = writeln!(out, "<li>arm savings: {:.0}%</li>", savings);
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</section>\n");
}

pub(super) fn to_html(run: &str, series: &[ContainerSeries], generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let title = format!("Monitoring Report: {}", escape(run));

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", title);
    let _ = writeln!(out, "<style>{}</style>", STYLE);
    out.push_str("</head>\n<body>\n");
    let _ = writeln!(out, "<h1>{}</h1>", title);
    let _ = writeln!(
        out,
        "<p class=\"meta\">Generated: {}</p>",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    for data in series {
        container_section(&mut out, data);
    }

    out.push_str("</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::super::tests::finished_series;
    use super::super::{render, ExportFormat};
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<a href=\"x\">Tom & 'Jerry'</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_report_is_self_contained() {
        let now = Utc.timestamp_opt(1_700_001_000, 0).unwrap();
        let html = render(ExportFormat::Html, "stack", &[finished_series()], now).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Monitoring Report: stack</title>"));
        assert!(html.contains("<h2>api,edge</h2>"));
        assert!(html.contains("<td>CPU %</td><td>10.0</td><td>25.0</td><td>40.0</td>"));
        assert_eq!(html.matches("<svg").count(), 2);
        assert!(html.contains("t3.micro"));
        assert!(html.contains("t4g.micro"));
        for external in ["<script", "src=", "href=", "<link", "http://", "https://"] {
            assert!(!html.contains(external), "report references {}", external);
        }
    }

    #[test]
    fn test_cpu_chart_spans_the_box() {
        let series = finished_series();
        let (points, peak) = chart_points(&series.samples, |s| s.cpu_percent);
        let coords: Vec<&str> = points.split(' ').collect();

        assert_eq!(peak, 40.0);
        assert_eq!(coords.len(), 4);
        assert_eq!(coords[0], "0.0,120.0");
        assert_eq!(coords[3], "640.0,0.0");
    }

    #[test]
    fn test_single_sample_chart_is_centred() {
        let mut series = finished_series();
        series.samples.truncate(1);
        let (points, _) = chart_points(&series.samples, |s| s.cpu_percent);
        assert_eq!(points, "320.0,0.0");
    }

    #[test]
    fn test_untrusted_names_are_escaped() {
        let mut series = finished_series();
        series.container_name = "<script>alert(1)</script>".into();
        series.image_name = "evil\"><img>".into();
        let html = to_html("<b>run</b>", &[series], Utc::now());

        assert!(!html.contains("<script>"));
        assert!(!html.contains("<img>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("Monitoring Report: &lt;b&gt;run&lt;/b&gt;"));
    }

    #[test]
    fn test_section_without_summary() {
        let series = ContainerSeries {
            container_name: "idle".into(),
            ..Default::default()
        };
        let html = to_html("stack", &[series], Utc::now());
        assert!(html.contains("No data for the selected range."));
        assert!(!html.contains("<svg"));
    }
}
