//! Report export

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use mdok_lib::export::{render, ExportFormat};
use mdok_lib::SeriesStore;

use super::{load_views, FilterArgs};
use crate::output::print_success;

/// Render a run and write it to `output`, or stdout when absent
pub fn export_run(
    store: &SeriesStore,
    name: &str,
    format: &str,
    output: Option<&Path>,
    filter: &FilterArgs,
) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    let views = load_views(store, name, filter)?;
    let rendered = render(format, name, &views, Utc::now())?;

    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Exported '{}' to {}", name, path.display()));
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mdok_lib::{ContainerSeries, Sample};
    use tempfile::TempDir;

    fn store_with_series(dir: &TempDir) -> SeriesStore {
        let store = SeriesStore::new(dir.path());
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let samples = (0..3)
            .map(|i| Sample {
                timestamp: start + chrono::Duration::seconds(i * 5),
                cpu_percent: 10.0 * (i + 1) as f64,
                ..Default::default()
            })
            .collect();
        store
            .save_series(
                "stack",
                &ContainerSeries {
                    container_id: "0123456789abcdef".into(),
                    container_name: "web".into(),
                    start_time: start,
                    interval_seconds: 5,
                    samples,
                    ..Default::default()
                },
            )
            .unwrap();
        store
    }

    #[test]
    fn test_export_html_to_file() {
        let dir = TempDir::new().unwrap();
        let store = store_with_series(&dir);
        let out = dir.path().join("report.html");

        let filter = FilterArgs {
            all: true,
            ..Default::default()
        };
        export_run(&store, "stack", "html", Some(&out), &filter).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("<!DOCTYPE html>"));
        assert!(text.contains("<h2>web</h2>"));
        assert!(text.contains("<polyline"));
    }

    #[test]
    fn test_export_csv_to_file() {
        let dir = TempDir::new().unwrap();
        let store = store_with_series(&dir);
        let out = dir.path().join("report.csv");

        export_run(&store, "stack", "csv", Some(&out), &FilterArgs::default()).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Container,"));
        assert!(lines.next().unwrap().starts_with("web,3,"));
    }

    #[test]
    fn test_export_unknown_format() {
        let dir = TempDir::new().unwrap();
        let store = store_with_series(&dir);

        assert!(export_run(&store, "stack", "xml", None, &FilterArgs::default()).is_err());
    }

    #[test]
    fn test_export_missing_run() {
        let dir = TempDir::new().unwrap();
        let store = SeriesStore::new(dir.path());

        assert!(export_run(&store, "nope", "json", None, &FilterArgs::default()).is_err());
    }
}
