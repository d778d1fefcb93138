//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use mdok_lib::analysis::MetricKind;
use mdok_lib::export::format_bytes_f64;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(&items),
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to serialize output: {}", e)),
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a metric value in the unit of its kind
pub fn format_metric(kind: MetricKind, value: f64) -> String {
    match kind {
        MetricKind::CpuPercent | MetricKind::MemoryPercent => format!("{:.1}%", value),
        MetricKind::MemoryUsage => format_bytes_f64(value),
        MetricKind::NetRxRate
        | MetricKind::NetTxRate
        | MetricKind::BlockReadRate
        | MetricKind::BlockWriteRate => format!("{}/s", format_bytes_f64(value)),
        MetricKind::PidsCount => format!("{:.0}", value),
    }
}

/// Format currency
pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Color a percentage by how close it is to saturation
pub fn color_percent(percent: f64) -> String {
    let formatted = format!("{:.1}%", percent);
    if percent >= 90.0 {
        formatted.red().to_string()
    } else if percent >= 70.0 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_metric_units() {
        assert_eq!(format_metric(MetricKind::CpuPercent, 12.345), "12.3%");
        assert_eq!(format_metric(MetricKind::MemoryUsage, 2048.0), "2.0 KB");
        assert_eq!(format_metric(MetricKind::NetTxRate, 512.0), "512 B/s");
        assert_eq!(format_metric(MetricKind::PidsCount, 7.4), "7");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.9), "$0.90");
    }
}
